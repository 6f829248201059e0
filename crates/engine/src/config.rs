use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_FUNCTION_DIR: &str = "/var/task";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    /// Directory the function unit is materialized into.
    pub function_dir: PathBuf,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            function_dir: PathBuf::from(DEFAULT_FUNCTION_DIR),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Environment variables:
    /// - RUNTIME_PORT: listen port (default: 8080)
    /// - RUNTIME_HOST: listen address (default: 0.0.0.0)
    /// - FUNCTION_DIR: where function code is written (default: /var/task)
    /// - RUST_LOG, then LOG_LEVEL: log filter (default: info)
    pub fn from_env() -> Self {
        Self::from_env_with(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(env_get: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env_get(key).filter(|value| !value.trim().is_empty());
        let port = match non_empty("RUNTIME_PORT") {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid RUNTIME_PORT {:?}, using {}", value, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            host: non_empty("RUNTIME_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            function_dir: non_empty("FUNCTION_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FUNCTION_DIR)),
            log_level: non_empty("RUST_LOG")
                .or_else(|| non_empty("LOG_LEVEL"))
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
