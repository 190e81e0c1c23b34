//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// How often the stored token is polled for changes made by other tabs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Configuration for a [`SessionTokenManager`](crate::SessionTokenManager).
///
/// Fixed at construction. Options that may also be set later at runtime
/// live in [`AccountsOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// First segment of every storage key, e.g. `tokenward.loginToken`.
    pub key_prefix: String,
    /// Token lifetime in days. `None` or 0 = 90 days.
    pub login_expiration_days: Option<u32>,
    /// Interval of the stored-token poll. Zero disables polling.
    pub poll_interval: Duration,
    /// Whether a stored token may be used to log in without asking.
    pub auto_login: bool,
    /// Path prefix the app is served under. When set, storage keys are
    /// namespaced with the server URL and this prefix.
    pub root_url_path_prefix: Option<String>,
    /// Whether the connection is a dedicated one rather than the app's
    /// default. When set, storage keys are namespaced with the server URL.
    pub dedicated_connection: bool,
    /// The URL fragment the app was opened with, e.g.
    /// `#/reset-password/abc`. Accounts links in it suspend auto-login.
    pub url_fragment: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            key_prefix: "tokenward".into(),
            login_expiration_days: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            auto_login: true,
            root_url_path_prefix: None,
            dedicated_connection: false,
            url_fragment: None,
        }
    }
}

/// Options that can be applied once, after construction.
///
/// Each option may be set only once over the manager's life; setting it
/// again is [`ConfigError::AlreadySet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsOptions {
    /// Token lifetime in days.
    pub login_expiration_days: Option<u32>,
}

impl AccountsOptions {
    /// Copies every option set in `other` into `self`.
    ///
    /// Checks every option before changing any, so a rejected call leaves
    /// `self` untouched.
    pub(crate) fn merge(&mut self, other: AccountsOptions) -> Result<(), ConfigError> {
        if other.login_expiration_days.is_some() && self.login_expiration_days.is_some() {
            return Err(ConfigError::AlreadySet("login_expiration_days"));
        }
        if other.login_expiration_days.is_some() {
            self.login_expiration_days = other.login_expiration_days;
        }
        Ok(())
    }
}
