//! Application: collects action modules, then freezes them into a direkt-core `App`.

use std::sync::Arc;

use direkt_core::{
    ActionDescriptor, ActionRegistry, Anonymous, App, Authenticator, CoreError, RouterConfig, Sanitizer,
    ServerConfig,
};
use serde_json::Value;

/// Registration phase of a router. Mutable until `build`/`run`; the registry is read-only afterwards.
pub struct Application {
    registry: ActionRegistry,
    router: RouterConfig,
    server: ServerConfig,
    authenticator: Arc<dyn Authenticator>,
    sanitizer: Sanitizer,
}

impl Application {
    pub fn new() -> Self {
        Self {
            registry: ActionRegistry::new(),
            router: RouterConfig::default(),
            server: ServerConfig::default(),
            authenticator: Arc::new(Anonymous),
            sanitizer: Sanitizer::new(),
        }
    }

    /// Register a module (one action, or a group of them). Like `app.register(&mut orders)`.
    pub fn register(&mut self, module: &mut dyn crate::core::Module) -> Result<(), CoreError> {
        module.register_into(self)
    }

    /// Register one action. Fails when the name is already taken.
    pub fn register_action(&mut self, action: ActionDescriptor) -> Result<(), CoreError> {
        tracing::debug!(
            action = %action.name(),
            methods = action.methods().count(),
            "registering action"
        );
        self.registry.register(action)
    }

    pub fn set_authenticator(&mut self, authenticator: impl Authenticator + 'static) {
        self.authenticator = Arc::new(authenticator);
    }

    pub fn set_router_config(&mut self, config: RouterConfig) {
        self.router = config;
    }

    pub fn set_server_config(&mut self, config: ServerConfig) {
        self.server = config;
    }

    pub fn set_sanitizer(&mut self, sanitizer: Sanitizer) {
        self.sanitizer = sanitizer;
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn router_config(&self) -> &RouterConfig {
        &self.router
    }

    pub fn server_config(&self) -> &ServerConfig {
        &self.server
    }

    /// Remoting API description of what is registered so far.
    pub fn api_descriptor(&self) -> Value {
        self.registry
            .api_descriptor(&format!("/{}", self.server.path), self.router.namespace.as_deref())
    }

    /// Freeze the registry and hand everything to the core app.
    pub fn build(self) -> App {
        App::new(self.registry, self.router)
            .with_sanitizer(self.sanitizer)
            .with_authenticator(self.authenticator)
            .with_server_config(self.server)
    }

    /// Run HTTP server (blocks until Ctrl-C) on the configured server address.
    pub fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.build().run()
    }

    /// Apply HOST/PORT/DIREKT_PATH/DIREKT_API_PATH and
    /// DIREKT_HOST_VERSION/DIREKT_MIN_HOST_VERSION/DIREKT_DEBUG over the configured
    /// settings. Unset variables keep what was configured in code; host and port
    /// fall back to the given defaults.
    pub fn configure_from_env(&mut self, default_host: &str, default_port: u16) -> Result<(), CoreError> {
        let env = |name: &str| std::env::var(name).ok();
        self.server = ServerConfig::new(default_host, default_port)
            .with_paths(&self.server.path, &self.server.api_path)
            .overlay(env);
        self.router = self.router.clone().overlay(env)?;
        Ok(())
    }

    /// `configure_from_env`, then `run`.
    pub fn run_from_env(
        mut self,
        default_host: &str,
        default_port: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.configure_from_env(default_host, default_port)?;
        self.run()
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}
