//! # Server Configuration
//!
//! Runtime settings collected from CLI flags and `EDIF_*` environment
//! variables (see `cli::ServeArgs`).

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

/// Document/account persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// Volatile, for demos and tests.
    Memory,
    #[default]
    Redb,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database: PathBuf,
    pub backend: Backend,
    /// Root directory of the object-storage bucket.
    pub uploads: PathBuf,
    /// Base of download URLs; defaults to `http://{host}:{port}`.
    pub public_url: Option<String>,
    /// How long an auth session may stay loading before it is forced
    /// to signed-out.
    pub auth_timeout: Duration,
    /// Bearer sessions unused for this long are dropped.
    pub session_idle: Duration,
    pub login_attempts_per_minute: u32,
    pub max_upload_mb: u64,
    pub cors_origin: Option<String>,
    /// Upper bound for `/api/live/{preset}` long-polls.
    pub long_poll: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: PathBuf::from("edif.redb"),
            backend: Backend::Redb,
            uploads: PathBuf::from("uploads"),
            public_url: None,
            auth_timeout: Duration::from_secs(10),
            session_idle: crate::auth::DEFAULT_SESSION_IDLE,
            login_attempts_per_minute: 5,
            max_upload_mb: edif_core::files::DEFAULT_MAX_MB,
            cors_origin: None,
            long_poll: Duration::from_secs(25),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL used in object download links, without trailing slash.
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.session_idle, Duration::from_secs(12 * 60 * 60));
        assert_eq!(config.public_base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn public_url_trailing_slash_is_trimmed() {
        let config = ServerConfig {
            public_url: Some("https://cdn.edif.example/".to_string()),
            ..ServerConfig::default()
        };
        assert_eq!(config.public_base_url(), "https://cdn.edif.example");
    }
}
