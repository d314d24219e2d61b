//! RPC router: one call in, one envelope out; batches keep input order.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde_json::{json, Value};

use crate::caller::Caller;
use crate::codes::{ErrorCode, HandlerError};
use crate::config::RouterConfig;
use crate::envelope::{Reply, ResponseEnvelope};
use crate::interceptor::panic_message;
use crate::protocol::{CallBatch, CallDescriptor, ParsedCall};
use crate::registry::ActionRegistry;
use crate::sanitizer::Sanitizer;
use crate::CoreError;

/// Step of the per-call pipeline, reported in diagnostic traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ResolveAction,
    BeforeAction,
    ResolveMethod,
    BeforeMethod,
    ShapeParams,
    Sanitize,
    Compatibility,
    Invoke,
    AfterMethod,
    AfterAction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ResolveAction => "resolve-action",
            Stage::BeforeAction => "before-action",
            Stage::ResolveMethod => "resolve-method",
            Stage::BeforeMethod => "before-method",
            Stage::ShapeParams => "shape-params",
            Stage::Sanitize => "sanitize",
            Stage::Compatibility => "compatibility",
            Stage::Invoke => "invoke",
            Stage::AfterMethod => "after-method",
            Stage::AfterAction => "after-action",
        };
        f.write_str(s)
    }
}

struct Failure {
    stage: Stage,
    error: CoreError,
    /// Partially built result, kept in the envelope (the numeric code for canonical errors).
    result: Option<Value>,
}

impl Failure {
    fn at(stage: Stage) -> impl FnOnce(CoreError) -> Failure {
        move |error| Failure {
            stage,
            error,
            result: None,
        }
    }

    fn canonical(stage: Stage, code: ErrorCode, call: &CallDescriptor) -> Failure {
        Failure {
            stage,
            error: CoreError::Domain {
                code,
                message: code.message(&call.method, &call.action),
            },
            result: Some(json!(code.code())),
        }
    }
}

/// Resolves, sanitizes, invokes and wraps calls against a frozen registry.
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    sanitizer: Sanitizer,
    config: RouterConfig,
}

impl Dispatcher {
    pub fn new(registry: ActionRegistry, config: RouterConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            sanitizer: Sanitizer::new(),
            config,
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Dispatch one call. Never fails: every error becomes an `exception` envelope.
    pub async fn dispatch(&self, call: &CallDescriptor, caller: &Caller) -> ResponseEnvelope {
        tracing::debug!(action = %call.action, method = %call.method, tid = ?call.tid, "dispatch");
        match self.run(call, caller).await {
            Ok(result) => ResponseEnvelope::rpc(call, result),
            Err(failure) => {
                tracing::warn!(
                    action = %call.action,
                    method = %call.method,
                    stage = %failure.stage,
                    error = %failure.error,
                    "call failed"
                );
                let trace = self
                    .config
                    .debug
                    .then(|| format!("{}.{} @ {}", call.action, call.method, failure.stage));
                ResponseEnvelope::exception(call, failure.error.to_string(), trace, failure.result)
            }
        }
    }

    /// Dispatch every entry concurrently; output order matches input order.
    pub async fn dispatch_batch(&self, calls: &[ParsedCall], caller: &Caller) -> Vec<ResponseEnvelope> {
        join_all(calls.iter().map(|entry| async move {
            match entry {
                Ok(call) => self.dispatch(call, caller).await,
                Err(reason) => {
                    tracing::warn!(%reason, "undecodable call descriptor");
                    ResponseEnvelope::invalid_call(reason)
                }
            }
        }))
        .await
    }

    /// Dispatch a parsed request and frame the reply like the request.
    pub async fn handle(&self, batch: CallBatch, caller: &Caller) -> Reply {
        let is_batch = batch.is_batch();
        let calls = batch.into_calls();
        let envelopes = self.dispatch_batch(&calls, caller).await;
        Reply::from_envelopes(is_batch, envelopes)
    }

    async fn run(&self, call: &CallDescriptor, caller: &Caller) -> Result<Value, Failure> {
        let action = self
            .registry
            .action(&call.action)
            .ok_or_else(|| CoreError::UndefinedAction(call.action.clone()))
            .map_err(Failure::at(Stage::ResolveAction))?;
        action
            .before_hooks()
            .run(call, None)
            .map_err(Failure::at(Stage::BeforeAction))?;

        let method = action
            .find_method(&call.method)
            .ok_or_else(|| CoreError::UndefinedMethod {
                action: call.action.clone(),
                method: call.method.clone(),
            })
            .map_err(Failure::at(Stage::ResolveMethod))?;
        method
            .before_hooks()
            .run(call, None)
            .map_err(Failure::at(Stage::BeforeMethod))?;

        let args = match method.shape_params(&call.data) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(error = %e, "argument count mismatch");
                return Err(Failure::canonical(Stage::ShapeParams, ErrorCode::Parameter, call));
            }
        };
        if let Some(violation) = self.sanitizer.find_violation_in(&args) {
            tracing::warn!(
                action = %call.action,
                method = %call.method,
                path = %violation.path,
                rule = violation.rule,
                "input rejected by sanitizer"
            );
            return Err(Failure::canonical(Stage::Sanitize, ErrorCode::Vulnerability, call));
        }
        if !self.config.is_compatible() {
            return Err(Failure::canonical(Stage::Compatibility, ErrorCode::Compatibility, call));
        }

        let handler = std::panic::catch_unwind(AssertUnwindSafe(|| action.instantiate(caller)))
            .map_err(|panic| CoreError::Handler(panic_message(panic.as_ref())))
            .map_err(Failure::at(Stage::Invoke))?;
        let outcome = AssertUnwindSafe(handler.invoke(&call.method, args))
            .catch_unwind()
            .await;
        let mut result = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(HandlerError::Code(code))) => {
                return Err(Failure::canonical(Stage::Invoke, code, call));
            }
            Ok(Err(HandlerError::Fault(message))) => {
                return Err(Failure::at(Stage::Invoke)(CoreError::Handler(message)));
            }
            Err(panic) => {
                return Err(Failure::at(Stage::Invoke)(CoreError::Handler(panic_message(
                    panic.as_ref(),
                ))));
            }
        };

        method
            .after_hooks()
            .run(call, Some(&mut result))
            .map_err(Failure::at(Stage::AfterMethod))?;
        action
            .after_hooks()
            .run(call, Some(&mut result))
            .map_err(Failure::at(Stage::AfterAction))?;
        Ok(result)
    }
}
