//! Pluggable handler groups.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::caller::Caller;
use crate::codes::HandlerResult;

/// One handler group instance, built per call from the caller identity.
///
/// `args` is already shaped: one element for structured methods, the
/// declared number of positional arguments otherwise.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn invoke(&self, method: &str, args: Vec<Value>) -> HandlerResult;
}

/// Builds a fresh handler for a call. Must not fail: handlers built for an
/// unauthenticated caller report `Connect` from every method instead.
pub type HandlerFactory = Arc<dyn Fn(&Caller) -> Box<dyn ActionHandler> + Send + Sync>;
