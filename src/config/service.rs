//! Endpoints and listener settings.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::credentials::{ConfigError, DEFAULT_CONF_PATH};

/// Self-serve build API root.
pub const DEFAULT_BUILDAPI_URL: &str = "https://secure.pub.build.mozilla.org/buildapi/self-serve";

/// Address the notification endpoint listens on.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Upper bound on any single outbound HTTP request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Service-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Root of the build API. Configure via `TB_BUILDAPI_URL`.
    pub buildapi_url: String,

    /// Root of the builder visibility service. Configure via
    /// `TB_VISIBILITY_URL`; when unset, hidden builders are never refreshed.
    pub visibility_url: Option<String>,

    /// Configure via `TB_LISTEN_ADDR`.
    pub listen_addr: SocketAddr,

    /// HMAC secret for inbound notifications. Configure via
    /// `TB_NOTIFY_SECRET`; when unset, signatures are not checked.
    pub notify_secret: Option<Vec<u8>>,

    /// Credentials file. Configure via `TB_CONF_PATH`.
    pub conf_path: PathBuf,

    /// Timeout for build API and visibility requests. Configure via
    /// `TB_HTTP_TIMEOUT_SECS`.
    pub http_timeout: Duration,
}

impl ServiceConfig {
    /// Reads service settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(super::env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen = lookup("TB_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(listen.clone()))?;

        Ok(ServiceConfig {
            buildapi_url: lookup("TB_BUILDAPI_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BUILDAPI_URL.to_string()),
            visibility_url: lookup("TB_VISIBILITY_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            listen_addr,
            notify_secret: lookup("TB_NOTIFY_SECRET").map(String::into_bytes),
            conf_path: lookup("TB_CONF_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONF_PATH)),
            http_timeout: lookup("TB_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
        })
    }
}
