//! Action module: one handler group. `.method()/.method_with_len()/.before()/.after()` then `app.register(module)`.

use std::sync::Arc;

use direkt_core::{
    ActionDescriptor, ActionHandler, CallDescriptor, Caller, CoreError, HandlerFactory, HookChain,
    MethodDescriptor,
};
use serde_json::Value;

use super::Action;
use crate::core::{Application, Module};

pub struct ActionModule {
    descriptor: ActionDescriptor,
}

impl ActionModule {
    /// Action named after the handler type. The factory runs once per call.
    pub fn new<H, F>(factory: F) -> Self
    where
        H: ActionHandler + Action + 'static,
        F: Fn(&Caller) -> H + Send + Sync + 'static,
    {
        Self::named(H::name(), factory)
    }

    /// Action with an explicit name, for handler types without `Action`.
    pub fn named<H, F>(name: &str, factory: F) -> Self
    where
        H: ActionHandler + 'static,
        F: Fn(&Caller) -> H + Send + Sync + 'static,
    {
        let factory: HandlerFactory =
            Arc::new(move |caller: &Caller| Box::new(factory(caller)) as Box<dyn ActionHandler>);
        Self {
            descriptor: ActionDescriptor::new(name, factory),
        }
    }

    /// Structured method: the call's `data` arrives as a single argument.
    pub fn method(self, name: &str) -> Self {
        self.method_descriptor(MethodDescriptor::new(name))
    }

    /// Positional method taking exactly `len` arguments.
    pub fn method_with_len(self, name: &str, len: usize) -> Self {
        self.method_descriptor(MethodDescriptor::with_len(name, len))
    }

    /// Method with its own hooks.
    pub fn method_descriptor(mut self, method: MethodDescriptor) -> Self {
        self.descriptor = self.descriptor.method(method);
        self
    }

    /// Action-scoped before-hook; runs ahead of every method of this action.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallDescriptor) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.descriptor = self.descriptor.before(HookChain::single(move |call, _| hook(call)));
        self
    }

    /// Action-scoped after-hook; may rewrite the result in place.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallDescriptor, &mut Value) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.descriptor = self.descriptor.after(HookChain::single(move |call, result| match result {
            Some(result) => hook(call, result),
            None => Ok(()),
        }));
        self
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn into_descriptor(self) -> ActionDescriptor {
        self.descriptor
    }
}

impl Module for ActionModule {
    fn register_into(&mut self, app: &mut Application) -> Result<(), CoreError> {
        app.register_action(self.descriptor.clone())
    }
}
