//! Action registry: action name -> method table + interceptor chains.
//!
//! Built once at startup, then frozen behind the dispatcher. Lookups are pure.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::caller::Caller;
use crate::handler::{ActionHandler, HandlerFactory};
use crate::interceptor::HookChain;
use crate::CoreError;

/// One callable operation.
///
/// `len: None` -> the call's `data` is passed as a single structured argument.
/// `len: Some(n)` -> `data` must be an array of exactly `n` positional arguments.
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    name: String,
    len: Option<usize>,
    before: HookChain,
    after: HookChain,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            len: None,
            before: HookChain::new(),
            after: HookChain::new(),
        }
    }

    pub fn with_len(name: impl Into<String>, len: usize) -> Self {
        Self {
            len: Some(len),
            ..Self::new(name)
        }
    }

    pub fn before(mut self, chain: HookChain) -> Self {
        self.before.extend(chain);
        self
    }

    pub fn after(mut self, chain: HookChain) -> Self {
        self.after.extend(chain);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Option<usize> {
        self.len
    }

    pub fn before_hooks(&self) -> &HookChain {
        &self.before
    }

    pub fn after_hooks(&self) -> &HookChain {
        &self.after
    }

    /// Unpack `data` into the argument list the handler receives.
    pub fn shape_params(&self, data: &Value) -> Result<Vec<Value>, CoreError> {
        let Some(expected) = self.len else {
            return Ok(vec![data.clone()]);
        };
        let arity = |got: String| CoreError::Arity {
            method: self.name.clone(),
            expected,
            got,
        };
        match data {
            Value::Null if expected == 0 => Ok(Vec::new()),
            Value::Array(items) if items.len() == expected => Ok(items.clone()),
            Value::Array(items) => Err(arity(items.len().to_string())),
            Value::Null => Err(arity("no data".into())),
            _ => Err(arity("a non-array value".into())),
        }
    }
}

/// Methods of one handler group, its factory and action-scoped hooks.
#[derive(Clone)]
pub struct ActionDescriptor {
    name: String,
    factory: HandlerFactory,
    methods: Vec<MethodDescriptor>,
    index: HashMap<String, usize>,
    before: HookChain,
    after: HookChain,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>, factory: HandlerFactory) -> Self {
        Self {
            name: name.into(),
            factory,
            methods: Vec::new(),
            index: HashMap::new(),
            before: HookChain::new(),
            after: HookChain::new(),
        }
    }

    /// Add a method; a later method with the same name replaces the earlier one.
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        match self.index.get(method.name()) {
            Some(&i) => self.methods[i] = method,
            None => {
                self.index.insert(method.name().to_string(), self.methods.len());
                self.methods.push(method);
            }
        }
        self
    }

    pub fn before(mut self, chain: HookChain) -> Self {
        self.before.extend(chain);
        self
    }

    pub fn after(mut self, chain: HookChain) -> Self {
        self.after.extend(chain);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.index.get(name).map(|&i| &self.methods[i])
    }

    /// Methods in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter()
    }

    pub fn before_hooks(&self) -> &HookChain {
        &self.before
    }

    pub fn after_hooks(&self) -> &HookChain {
        &self.after
    }

    /// Fresh handler for one call.
    pub fn instantiate(&self, caller: &Caller) -> Box<dyn ActionHandler> {
        (self.factory)(caller)
    }
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionDescriptor>,
    order: Vec<String>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: ActionDescriptor) -> Result<(), CoreError> {
        if self.actions.contains_key(action.name()) {
            return Err(CoreError::Registration(format!(
                "action {:?} registered twice",
                action.name()
            )));
        }
        self.order.push(action.name().to_string());
        self.actions.insert(action.name().to_string(), action);
        Ok(())
    }

    pub fn action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.get(name)
    }

    pub fn resolve(
        &self,
        action: &str,
        method: &str,
    ) -> Result<(&ActionDescriptor, &MethodDescriptor), CoreError> {
        let a = self
            .action(action)
            .ok_or_else(|| CoreError::UndefinedAction(action.to_string()))?;
        let m = a.find_method(method).ok_or_else(|| CoreError::UndefinedMethod {
            action: action.to_string(),
            method: method.to_string(),
        })?;
        Ok((a, m))
    }

    /// Actions in registration order.
    pub fn actions(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.order.iter().filter_map(|name| self.actions.get(name))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Remoting API description for clients: actions and their methods with `len` where declared.
    pub fn api_descriptor(&self, url: &str, namespace: Option<&str>) -> Value {
        let actions: Map<String, Value> = self
            .actions()
            .map(|a| {
                let methods: Vec<Value> = a
                    .methods()
                    .map(|m| match m.arity() {
                        Some(len) => json!({ "name": m.name(), "len": len }),
                        None => json!({ "name": m.name() }),
                    })
                    .collect();
                (a.name().to_string(), Value::Array(methods))
            })
            .collect();
        let mut api = json!({
            "url": url,
            "type": "remoting",
            "actions": actions,
        });
        if let (Some(ns), Some(obj)) = (namespace, api.as_object_mut()) {
            obj.insert("namespace".into(), Value::String(ns.to_string()));
        }
        api
    }
}
