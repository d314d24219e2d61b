//! Server and router settings. Env: HOST, PORT, DIREKT_PATH, DIREKT_API_PATH,
//! DIREKT_HOST_VERSION, DIREKT_MIN_HOST_VERSION, DIREKT_DEBUG.

use semver::Version;

use crate::CoreError;

/// Where the HTTP endpoint listens and which paths it serves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Router endpoint path, without leading slash.
    pub path: String,
    /// API descriptor path, without leading slash.
    pub api_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            path: "router".into(),
            api_path: "api".into(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    pub fn with_paths(mut self, path: &str, api_path: &str) -> Self {
        self.path = path.trim_matches('/').to_string();
        self.api_path = api_path.trim_matches('/').to_string();
        self
    }

    /// Defaults overridden by HOST, PORT, DIREKT_PATH, DIREKT_API_PATH.
    pub fn from_env(default_host: &str, default_port: u16) -> Self {
        Self::new(default_host, default_port).overlay(env_var)
    }

    /// Replace the fields whose variable is set; the rest stay as they are.
    /// An unparsable PORT is ignored.
    pub fn overlay(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = var("HOST") {
            self.host = host;
        }
        if let Some(port) = var("PORT").and_then(|s| s.parse().ok()) {
            self.port = port;
        }
        let path = var("DIREKT_PATH").unwrap_or_else(|| self.path.clone());
        let api_path = var("DIREKT_API_PATH").unwrap_or_else(|| self.api_path.clone());
        self.with_paths(&path, &api_path)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Dispatch behaviour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterConfig {
    /// Version of the host system the handlers talk to.
    pub host_version: Option<Version>,
    /// Calls fail with the compatibility error when the host is older than this.
    pub min_host_version: Option<Version>,
    /// Attach the `where` trace to exception envelopes.
    pub debug: bool,
    /// Client namespace advertised in the API descriptor.
    pub namespace: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host_version: None,
            min_host_version: None,
            debug: true,
            namespace: None,
        }
    }
}

impl RouterConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::default().overlay(env_var)
    }

    /// Replace the fields whose variable is set; the rest stay as they are.
    pub fn overlay(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        if let Some(v) = var("DIREKT_HOST_VERSION") {
            self.host_version = Some(parse_version(&v)?);
        }
        if let Some(v) = var("DIREKT_MIN_HOST_VERSION") {
            self.min_host_version = Some(parse_version(&v)?);
        }
        if let Some(v) = var("DIREKT_DEBUG") {
            self.debug = parse_flag(&v)?;
        }
        Ok(self)
    }

    pub fn with_versions(mut self, host: &str, min: &str) -> Result<Self, CoreError> {
        self.host_version = Some(parse_version(host)?);
        self.min_host_version = Some(parse_version(min)?);
        Ok(self)
    }

    /// Only enforced when both versions are known.
    pub fn is_compatible(&self) -> bool {
        match (&self.host_version, &self.min_host_version) {
            (Some(host), Some(min)) => host >= min,
            _ => true,
        }
    }
}

/// Semver, padding short forms: "3.5" -> 3.5.0, "4" -> 4.0.0.
pub fn parse_version(text: &str) -> Result<Version, CoreError> {
    let text = text.trim();
    let padded = match text.split('.').count() {
        1 => format!("{text}.0.0"),
        2 => format!("{text}.0"),
        _ => text.to_string(),
    };
    Version::parse(&padded).map_err(|e| CoreError::Config(format!("version {text:?}: {e}")))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_flag(text: &str) -> Result<bool, CoreError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::Config(format!("not a boolean: {other:?}"))),
    }
}
