//! Injection check over call parameters.
//!
//! Walks a JSON value depth-first and tests every string leaf against a rule
//! set of SQL and script injection fragments. Object keys, numbers, booleans
//! and nulls are not tested. Empty containers pass.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct Rule {
    pub name: &'static str,
    pattern: Regex,
}

impl Rule {
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("sql_delete", r"(?i)delete\s+from"),
    ("sql_create_table", r"(?i)create\s+table"),
    ("sql_update", r"(?is)update.+set.+="),
    ("sql_insert", r"(?i)insert\s+into"),
    ("sql_select", r"(?is)select.+from"),
    ("sql_union", r"(?is)union.+select"),
    ("sql_tautology", r"(?i)'\s*(or|and)\s+'?[^'=]*'?\s*="),
    ("sql_comment", r"'\s*(--|#|/\*)"),
    ("path_traversal", r"(?i)(\.\.%2f)+"),
    ("script_tag", r"(?i)<script"),
    ("style_tag", r"(?i)<style"),
    ("base_href", r"(?i)base\s+href"),
    ("script_uri", r"(?i)(java|vb)script:"),
];

fn default_rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        DEFAULT_PATTERNS
            .iter()
            .map(|(name, pattern)| match Rule::new(name, pattern) {
                Ok(rule) => rule,
                Err(_) => unreachable!("static sanitizer pattern is valid"),
            })
            .collect()
    })
}

/// First rejected leaf: its JSON path and the rule it tripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub rule: &'static str,
}

#[derive(Clone, Debug)]
pub struct Sanitizer {
    rules: Vec<Rule>,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self {
            rules: default_rules().to_vec(),
        }
    }

    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn add_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// True when no leaf is rejected. Never alters the value.
    pub fn sanitize(&self, value: &Value) -> bool {
        self.find_violation(value).is_none()
    }

    pub fn find_violation(&self, value: &Value) -> Option<Violation> {
        self.walk(String::from("$"), value)
    }

    /// Same walk over a shaped argument list; paths are `$[i]...`.
    pub fn find_violation_in(&self, args: &[Value]) -> Option<Violation> {
        args.iter()
            .enumerate()
            .find_map(|(i, arg)| self.walk(format!("$[{i}]"), arg))
    }

    pub fn check_str(&self, text: &str) -> Option<&'static str> {
        self.rules.iter().find(|r| r.is_match(text)).map(|r| r.name)
    }

    fn walk(&self, root: String, value: &Value) -> Option<Violation> {
        // explicit stack: nesting depth of client input is unbounded
        let mut stack = vec![(root, value)];
        while let Some((path, value)) = stack.pop() {
            match value {
                Value::String(s) => {
                    if let Some(rule) = self.check_str(s) {
                        return Some(Violation { path, rule });
                    }
                }
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate().rev() {
                        stack.push((format!("{path}[{i}]"), item));
                    }
                }
                Value::Object(map) => {
                    let children: Vec<_> = map.iter().collect();
                    for (key, item) in children.into_iter().rev() {
                        stack.push((format!("{path}.{key}"), item));
                    }
                }
                Value::Null | Value::Bool(_) | Value::Number(_) => {}
            }
        }
        None
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}
