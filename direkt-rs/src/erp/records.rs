//! Shapes shared by the ERP handler groups: read filters and one-or-many record payloads.

use std::collections::BTreeMap;

use direkt_core::{ErrorCode, HandlerError};
use serde_json::Value;

use super::store::Record;

/// Equality filter from `{"filter": [{"property": .., "value": ..}]}`.
///
/// Clauses on different properties must all hold; repeated clauses on one
/// property match any of their values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: BTreeMap<String, Vec<Value>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.clauses
            .entry(property.to_string())
            .or_default()
            .push(value.into());
        self
    }

    /// Read the client filter list. Unknown shapes yield an empty filter.
    pub fn from_params(params: &Value) -> Self {
        let mut filter = Self::new();
        let Some(items) = params.get("filter").and_then(Value::as_array) else {
            return filter;
        };
        for item in items {
            if let (Some(property), Some(value)) = (item.get("property").and_then(Value::as_str), item.get("value")) {
                filter = filter.with_value(property, value.clone());
            }
        }
        filter
    }

    /// Keep only clauses on `properties`, renaming through the given pairs (client name, stored name).
    pub fn project(&self, properties: &[(&str, &str)]) -> Self {
        let mut out = Self::new();
        for (client, stored) in properties {
            if let Some(values) = self.clauses.get(*client) {
                out.clauses
                    .entry((*stored).to_string())
                    .or_default()
                    .extend(values.iter().cloned());
            }
        }
        out
    }

    /// First value given for `property`.
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.clauses.get(property).and_then(|v| v.first())
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(property, values)| {
            record
                .get(property)
                .is_some_and(|field| values.iter().any(|v| loose_eq(field, v)))
        })
    }
}

/// Clients send numbers as strings often enough that "3" and 3 compare equal.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (scalar_text(a), scalar_text(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Positive integer id from a number or a numeric string.
pub fn id_of(value: Option<&Value>) -> Option<i64> {
    let id = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

/// Write payload: a single record or an array of them. Answers in the shape it was given.
#[derive(Clone, Debug, PartialEq)]
pub enum Records {
    One(Record),
    Many(Vec<Record>),
}

impl Records {
    pub fn from_param(param: Value) -> Result<Self, HandlerError> {
        match param {
            Value::Object(record) => Ok(Records::One(record)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    _ => Err(HandlerError::Code(ErrorCode::Parameter)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Records::Many),
            _ => Err(HandlerError::Code(ErrorCode::Parameter)),
        }
    }

    pub fn items_mut(&mut self) -> &mut [Record] {
        match self {
            Records::One(record) => std::slice::from_mut(record),
            Records::Many(records) => records,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Records::One(record) => Value::Object(record),
            Records::Many(records) => Value::Array(records.into_iter().map(Value::Object).collect()),
        }
    }
}

/// Copy the present fields among `fields` (client name, stored name) out of `params`.
pub fn pick(params: &Record, fields: &[(&str, &str)]) -> Record {
    fields
        .iter()
        .filter_map(|(client, stored)| {
            params
                .get(*client)
                .filter(|v| !v.is_null())
                .map(|v| ((*stored).to_string(), v.clone()))
        })
        .collect()
}

/// Inverse of `pick`: rename stored fields back to client names, keeping `id`.
pub fn present(row: &Record, fields: &[(&str, &str)]) -> Record {
    let mut out = Record::new();
    if let Some(id) = row.get("id") {
        out.insert("id".into(), id.clone());
    }
    for (client, stored) in fields {
        if let Some(v) = row.get(*stored) {
            out.insert((*client).to_string(), v.clone());
        }
    }
    out
}
