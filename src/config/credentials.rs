//! Credentials and the user allow-list.
//!
//! Each setting is taken from the environment when present. Anything missing
//! is read from a JSON config file shaped like:
//!
//! ```json
//! {
//!   "pulse_user": "...", "pulse_pw": "...",
//!   "ldap_user": "...", "ldap_pw": "...",
//!   "triggerbot_users": ["dev@example.com"]
//! }
//! ```
//!
//! The file is only opened if the environment is incomplete.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Config file consulted when the environment lacks a setting.
pub const DEFAULT_CONF_PATH: &str = "../scratch/conf.json";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON or lacks a required key.
    #[error("invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The listen address could not be parsed.
    #[error("invalid listen address {0:?}")]
    InvalidListenAddr(String),
}

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything the service needs to authenticate and authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login for the build notification bus.
    pub pulse: Credential,
    /// Login for the build API.
    pub ldap: Credential,
    /// Submitters whose pushes may actually be retriggered.
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfFile {
    pulse_user: String,
    pulse_pw: String,
    ldap_user: String,
    ldap_pw: String,
    triggerbot_users: Vec<String>,
}

impl Credentials {
    /// Loads credentials from the environment, falling back to `conf_path`.
    pub fn load(conf_path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(super::env_lookup, conf_path)
    }

    /// Loads credentials using an arbitrary variable lookup.
    ///
    /// A credential pair is only taken from the environment when both halves
    /// are present. `TB_USERS` is whitespace-separated.
    pub fn load_with(
        lookup: impl Fn(&str) -> Option<String>,
        conf_path: &Path,
    ) -> Result<Self, ConfigError> {
        let pair = |user: &str, pw: &str| match (lookup(user), lookup(pw)) {
            (Some(u), Some(p)) => Some(Credential::new(u, p)),
            _ => None,
        };

        let pulse = pair("TB_PULSE_USERNAME", "TB_PULSE_PW");
        let ldap = pair("TB_LDAP_USERNAME", "TB_LDAP_PW");
        let users = lookup("TB_USERS")
            .map(|s| s.split_whitespace().map(str::to_string).collect::<Vec<_>>());

        if let (Some(pulse), Some(ldap), Some(users)) = (&pulse, &ldap, &users) {
            return Ok(Credentials {
                pulse: pulse.clone(),
                ldap: ldap.clone(),
                users: users.clone(),
            });
        }

        let file = read_conf_file(conf_path)?;
        Ok(Credentials {
            pulse: pulse.unwrap_or_else(|| Credential::new(file.pulse_user, file.pulse_pw)),
            ldap: ldap.unwrap_or_else(|| Credential::new(file.ldap_user, file.ldap_pw)),
            users: users.unwrap_or(file.triggerbot_users),
        })
    }
}

fn read_conf_file(path: &Path) -> Result<ConfFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
