//! Direkt core: batched RPC dispatch, interceptors, sanitizer, request parsing, HTTP server.

pub mod caller;
pub mod codes;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod handler;
pub mod http;
pub mod interceptor;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod sanitizer;

pub use caller::{Anonymous, Authenticator, Caller, Operation, Rights};
pub use codes::{ErrorCode, HandlerError, HandlerResult};
pub use config::{parse_version, RouterConfig, ServerConfig};
pub use dispatcher::Dispatcher;
pub use envelope::{Rendered, Reply, ResponseEnvelope};
pub use handler::{ActionHandler, HandlerFactory};
pub use interceptor::{Hook, HookChain};
pub use protocol::{CallBatch, CallDescriptor, ParsedCall};
pub use registry::{ActionDescriptor, ActionRegistry, MethodDescriptor};
pub use request::InboundRequest;
pub use sanitizer::{Sanitizer, Violation};

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Call to undefined action: {0}")]
    UndefinedAction(String),
    #[error("Call to undefined method: {method} on action {action}")]
    UndefinedMethod { action: String, method: String },
    #[error("method {method} expects {expected} argument(s), got {got}")]
    Arity {
        method: String,
        expected: usize,
        got: String,
    },
    /// Canonical error reported by a handler, the sanitizer or the compatibility check.
    #[error("{message}")]
    Domain { code: ErrorCode, message: String },
    #[error("{0}")]
    Hook(String),
    #[error("{0}")]
    Handler(String),
    #[error("registration error: {0}")]
    Registration(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("route not found: {0}")]
    NotFound(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Inbound HTTP request as seen by the application, independent of the server.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RequestContext {
    pub fn post(path: &str, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: "POST".into(),
            path: path.to_string(),
            query_string: String::new(),
            headers: vec![("content-type".into(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// First header value with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response produced by the application; the server turns it into HTTP.
#[derive(Clone, Debug)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl Response {
    fn error(status_code: u16, err: &CoreError) -> Self {
        let body = serde_json::json!({ "error": err.to_string() });
        Self {
            status_code,
            body: body.to_string().into_bytes(),
            content_type: Some("application/json".into()),
        }
    }
}

/// Core app: dispatcher over a frozen registry, authenticator, endpoint paths.
pub struct App {
    dispatcher: Dispatcher,
    authenticator: Arc<dyn Authenticator>,
    server: ServerConfig,
}

impl App {
    pub fn new(registry: ActionRegistry, config: RouterConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry, config),
            authenticator: Arc::new(Anonymous),
            server: ServerConfig::default(),
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.dispatcher = self.dispatcher.with_sanitizer(sanitizer);
        self
    }

    pub fn with_server_config(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.server
    }

    /// Remoting API description served on the API path.
    pub fn api_descriptor(&self) -> serde_json::Value {
        self.dispatcher.registry().api_descriptor(
            &format!("/{}", self.server.path),
            self.dispatcher.config().namespace.as_deref(),
        )
    }

    /// Handle a request without HTTP: router endpoint, API descriptor, or 404.
    pub async fn handle_request(&self, req: &RequestContext) -> Response {
        let path = req.path.trim_matches('/');
        let method = req.method.to_uppercase();

        if method == "POST" && path == self.server.path {
            return self.handle_rpc(req).await;
        }

        let api_js = format!("{}.js", self.server.api_path);
        if method == "GET" && (path == self.server.api_path || path == api_js) {
            let as_js = path == api_js
                || req
                    .query_string
                    .split('&')
                    .any(|p| p.eq_ignore_ascii_case("format=js"));
            return self.api_response(as_js);
        }

        Response::error(404, &CoreError::NotFound(format!("{} {}", method, path)))
    }

    async fn handle_rpc(&self, req: &RequestContext) -> Response {
        let caller = self.authenticator.authenticate(&req.headers).await;
        let (reply, upload) = match InboundRequest::parse(req.header("content-type"), &req.body) {
            Ok(inbound) => {
                let upload = inbound.form && inbound.upload;
                (self.dispatcher.handle(inbound.batch, &caller).await, upload)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected inbound request");
                (Reply::Single(ResponseEnvelope::invalid_request(&e)), false)
            }
        };
        match reply.render(upload) {
            Ok(rendered) => Response {
                status_code: 200,
                body: rendered.body,
                content_type: Some(rendered.content_type.into()),
            },
            Err(e) => Response::error(500, &e),
        }
    }

    fn api_response(&self, as_js: bool) -> Response {
        let descriptor = self.api_descriptor();
        let (body, content_type) = if as_js {
            (
                format!("Ext.app.REMOTING_API = {};", descriptor),
                "text/javascript",
            )
        } else {
            (descriptor.to_string(), "application/json")
        };
        Response {
            status_code: 200,
            body: body.into_bytes(),
            content_type: Some(content_type.into()),
        }
    }

    /// Run HTTP server (blocks until Ctrl-C).
    pub fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        http::run(Arc::new(self))
    }
}
