//! Before/after hook chains at action and method granularity.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::protocol::CallDescriptor;
use crate::CoreError;

/// Hook: (call, result). Before-hooks get `None`; after-hooks get the in-progress result.
pub type Hook = Arc<dyn Fn(&CallDescriptor, Option<&mut Value>) -> Result<(), CoreError> + Send + Sync>;

/// Ordered hooks. Empty chain is a no-op.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Hook>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain of exactly one hook.
    pub fn single<F>(hook: F) -> Self
    where
        F: Fn(&CallDescriptor, Option<&mut Value>) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        Self {
            hooks: vec![Arc::new(hook)],
        }
    }

    pub fn push<F>(&mut self, hook: F)
    where
        F: Fn(&CallDescriptor, Option<&mut Value>) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
    }

    pub fn then<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallDescriptor, Option<&mut Value>) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.push(hook);
        self
    }

    pub fn extend(&mut self, other: HookChain) {
        self.hooks.extend(other.hooks);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run hooks in order; the first error (or panic) aborts the rest of the chain.
    pub fn run(&self, call: &CallDescriptor, mut result: Option<&mut Value>) -> Result<(), CoreError> {
        for hook in &self.hooks {
            let outcome = catch_unwind(AssertUnwindSafe(|| hook(call, result.as_deref_mut())));
            match outcome {
                Ok(r) => r?,
                Err(panic) => return Err(CoreError::Hook(panic_message(panic.as_ref()))),
            }
        }
        Ok(())
    }
}

impl FromIterator<Hook> for HookChain {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        Self {
            hooks: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain").field("len", &self.hooks.len()).finish()
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn call() -> CallDescriptor {
        CallDescriptor::new("A", "m", Value::Null)
    }

    #[test]
    fn runs_in_order_and_mutates_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s1, s2) = (Arc::clone(&seen), Arc::clone(&seen));
        let chain = HookChain::new()
            .then(move |_, r| {
                s1.lock().unwrap().push(1);
                if let Some(r) = r {
                    *r = json!({"wrapped": r.take()});
                }
                Ok(())
            })
            .then(move |_, _| {
                s2.lock().unwrap().push(2);
                Ok(())
            });
        let mut result = json!(5);
        chain.run(&call(), Some(&mut result)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(result, json!({"wrapped": 5}));
    }

    #[test]
    fn error_aborts_rest() {
        let hit = Arc::new(Mutex::new(false));
        let h = Arc::clone(&hit);
        let chain = HookChain::single(|_, _| Err(CoreError::Hook("denied".into()))).then(move |_, _| {
            *h.lock().unwrap() = true;
            Ok(())
        });
        let err = chain.run(&call(), None).unwrap_err();
        assert_eq!(err.to_string(), "denied");
        assert!(!*hit.lock().unwrap());
    }

    #[test]
    fn panic_becomes_error() {
        let chain = HookChain::single(|_, _| panic!("hook blew up"));
        let err = chain.run(&call(), None).unwrap_err();
        assert!(matches!(err, CoreError::Hook(ref m) if m == "hook blew up"));
    }

    #[test]
    fn empty_chain_is_noop() {
        assert!(HookChain::new().run(&call(), None).is_ok());
    }
}
