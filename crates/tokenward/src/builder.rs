//! `AccountsClientBuilder`: a session manager wired to an accounts
//! service in the same process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokenward_client::{ClientConfig, SessionTokenManager};
use tokenward_rpc::LocalConnection;
use tokenward_server::{AccountsService, Authenticator};
use tokenward_store::{FileStore, KeyValueStore};

/// Builder for a [`SessionTokenManager`] talking to an [`AccountsService`]
/// over a [`LocalConnection`].
///
/// # Example
///
/// ```rust,ignore
/// use tokenward::prelude::*;
///
/// let service = Arc::new(AccountsService::new(table, ServiceConfig::default()));
/// let tab = AccountsClientBuilder::new()
///     .poll_interval(Duration::from_secs(1))
///     .build(&service, MemoryStore::new());
/// tab.start();
/// ```
#[derive(Debug, Clone)]
pub struct AccountsClientBuilder {
    url: String,
    config: ClientConfig,
}

impl AccountsClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            url: "local://accounts".to_string(),
            config: ClientConfig::default(),
        }
    }

    /// Sets the URL the connection reports. It appears in namespaced
    /// storage keys.
    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Replaces the whole client configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the first segment of every storage key.
    pub fn key_prefix(mut self, prefix: &str) -> Self {
        self.config.key_prefix = prefix.to_string();
        self
    }

    /// Sets the stored-token poll interval. Zero disables polling.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Sets the token lifetime.
    pub fn login_expiration_days(mut self, days: u32) -> Self {
        self.config.login_expiration_days = Some(days);
        self
    }

    /// Sets the URL fragment the app was opened with.
    pub fn url_fragment(mut self, fragment: &str) -> Self {
        self.config.url_fragment = Some(fragment.to_string());
        self
    }

    /// Enables or disables auto-login.
    pub fn auto_login(mut self, enabled: bool) -> Self {
        self.config.auto_login = enabled;
        self
    }

    /// Connects to `service` and builds the manager over `store`.
    ///
    /// Must be called inside a tokio runtime. The manager is not started;
    /// call [`SessionTokenManager::start`].
    pub fn build<A: Authenticator, S: KeyValueStore>(
        self,
        service: &Arc<AccountsService<A>>,
        store: S,
    ) -> SessionTokenManager<LocalConnection, S> {
        let connection = LocalConnection::connect(Arc::clone(service), self.url);
        tracing::debug!(key_prefix = %self.config.key_prefix, "building session manager");
        SessionTokenManager::new(connection, store, self.config)
    }

    /// [`build`](Self::build) over a JSON file store at `path`.
    pub fn build_with_file<A: Authenticator>(
        self,
        service: &Arc<AccountsService<A>>,
        path: impl Into<PathBuf>,
    ) -> SessionTokenManager<LocalConnection, FileStore> {
        self.build(service, FileStore::open(path))
    }
}

impl Default for AccountsClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
