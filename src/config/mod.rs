//! Runtime configuration.
//!
//! Configuration comes from three places:
//!
//! - [`EngineConfig`]: the retrigger policy knobs, with defaults that can be
//!   overridden through `TB_*` environment variables
//! - [`Credentials`]: bus and build API logins plus the user allow-list, read
//!   from the environment or from a JSON config file
//! - [`ServiceConfig`]: endpoints, HTTP timeout, listen address and the
//!   notification secret
//!
//! Unparseable numeric overrides fall back to their defaults rather than
//! failing startup.

mod credentials;
mod engine;
mod service;

pub use credentials::{ConfigError, Credential, Credentials, DEFAULT_CONF_PATH};
pub use engine::EngineConfig;
pub use service::{DEFAULT_BUILDAPI_URL, DEFAULT_HTTP_TIMEOUT, DEFAULT_LISTEN_ADDR, ServiceConfig};

/// Reads a variable from the process environment.
///
/// Every `from_env` constructor is a thin wrapper over a `from_lookup`
/// variant that takes a lookup function, so tests never touch the real
/// environment.
pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
