//! The accounts method service.
//!
//! [`AccountsService`] answers the four login methods for every
//! connection and remembers which token each connection logged in with,
//! so `logout` and `removeOtherTokens` know what to revoke.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokenward_poll::{PollConfig, PollScheduler};
use tokenward_protocol::{LoginRequest, TokenLifetime, UserId, methods};
use tokenward_rpc::{ConnectionId, MethodContext, MethodHandler, MethodResult};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Authenticator, ServerError, TokenRegistry};

/// How often the expiry sweep runs by default.
pub const EXPIRE_TOKENS_INTERVAL: Duration = Duration::from_secs(10 * 60);

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Configuration for an [`AccountsService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Days until an issued token expires. `None` or 0 = 90 days.
    pub login_expiration_days: Option<u32>,
    /// Interval between expiry sweeps.
    pub expire_tokens_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            login_expiration_days: None,
            expire_tokens_interval: EXPIRE_TOKENS_INTERVAL,
        }
    }
}

impl TokenLifetime for ServiceConfig {
    fn login_expiration_days(&self) -> Option<u32> {
        self.login_expiration_days
    }
}

// ---------------------------------------------------------------------------
// AccountsService
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct LoggedIn {
    user_id: UserId,
    token: String,
}

#[derive(Debug)]
struct ServiceState {
    registry: TokenRegistry,
    connections: HashMap<ConnectionId, LoggedIn>,
}

/// Answers `login`, `logout`, `getNewToken` and `removeOtherTokens`.
///
/// Share it behind an `Arc`; every connection calls into the same
/// instance.
#[derive(Debug)]
pub struct AccountsService<A> {
    authenticator: A,
    config: ServiceConfig,
    state: Mutex<ServiceState>,
}

impl<A: Authenticator> AccountsService<A> {
    /// Creates a service with an empty token registry.
    pub fn new(authenticator: A, config: ServiceConfig) -> Self {
        let registry = TokenRegistry::new(&config);
        Self {
            authenticator,
            config,
            state: Mutex::new(ServiceState {
                registry,
                connections: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The user a server-side session is logged in as.
    pub fn user_for(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.state()
            .connections
            .get(&connection_id)
            .map(|l| l.user_id.clone())
    }

    /// Number of live resume tokens held by `user_id`.
    pub fn tokens_for(&self, user_id: &UserId) -> usize {
        self.state().registry.tokens_for(user_id)
    }

    /// Revokes a token as if it had expired or an admin removed it.
    /// Connections logged in with it are logged out.
    pub fn revoke_token(&self, token: &str) -> bool {
        let mut state = self.state();
        state.connections.retain(|_, l| l.token != token);
        state.registry.revoke(token)
    }

    /// Runs one expiry sweep now. Returns how many tokens were removed.
    pub fn expire_tokens(&self) -> usize {
        let mut state = self.state();
        let expired = state.registry.expire_stale();
        state
            .connections
            .retain(|_, l| !expired.iter().any(|t| *t == l.token));
        expired.len()
    }

    // -- Methods ------------------------------------------------------------

    async fn login(&self, ctx: &MethodContext, params: &[Value]) -> Result<Value, ServerError> {
        let request = LoginRequest::from_params(params)?;
        let issued = match request {
            LoginRequest::Resume { resume } => {
                let mut state = self.state();
                state.registry.resume(resume.as_str())?
            }
            LoginRequest::Password { user, password } => {
                let user_id = self.authenticator.authenticate(&user, &password).await?;
                let mut state = self.state();
                state.registry.issue(user_id)
            }
        };

        self.state().connections.insert(
            ctx.connection_id,
            LoggedIn {
                user_id: issued.user_id.clone(),
                token: issued.token.as_str().to_string(),
            },
        );
        info!(user_id = %issued.user_id, connection = %ctx.connection_id, "login succeeded");
        Ok(issued.to_login_result().to_value())
    }

    fn logout(&self, ctx: &MethodContext) -> Result<Value, ServerError> {
        let mut state = self.state();
        if let Some(logged_in) = state.connections.remove(&ctx.connection_id) {
            state.registry.revoke(&logged_in.token);
            info!(user_id = %logged_in.user_id, connection = %ctx.connection_id, "logged out");
        }
        Ok(Value::Null)
    }

    fn get_new_token(&self, ctx: &MethodContext) -> Result<Value, ServerError> {
        let mut state = self.state();
        let user_id = state
            .connections
            .get(&ctx.connection_id)
            .map(|l| l.user_id.clone())
            .ok_or(ServerError::NotLoggedIn)?;

        let issued = state.registry.issue(user_id);
        if let Some(logged_in) = state.connections.get_mut(&ctx.connection_id) {
            logged_in.token = issued.token.as_str().to_string();
        }
        info!(user_id = %issued.user_id, connection = %ctx.connection_id, "resume token rotated");
        Ok(issued.to_login_result().to_value())
    }

    fn remove_other_tokens(&self, ctx: &MethodContext) -> Result<Value, ServerError> {
        let mut state = self.state();
        let (user_id, keep) = state
            .connections
            .get(&ctx.connection_id)
            .map(|l| (l.user_id.clone(), l.token.clone()))
            .ok_or(ServerError::NotLoggedIn)?;

        let removed = state.registry.revoke_all_except(&user_id, &keep);
        state
            .connections
            .retain(|_, l| !removed.iter().any(|t| *t == l.token));
        Ok(Value::Null)
    }
}

impl<A: Authenticator> AccountsService<A> {
    /// Spawns the periodic expiry sweep.
    ///
    /// The task holds only a weak reference and stops once the service
    /// is dropped.
    pub fn spawn_expiry_sweep(self: &Arc<Self>) -> JoinHandle<()> {
        let service: Weak<Self> = Arc::downgrade(self);
        let mut scheduler = PollScheduler::new(PollConfig::every(self.config.expire_tokens_interval));
        tokio::spawn(async move {
            loop {
                scheduler.wait_for_poll().await;
                let Some(service) = service.upgrade() else {
                    debug!("accounts service dropped, stopping expiry sweep");
                    return;
                };
                let removed = service.expire_tokens();
                debug!(removed, "expiry sweep finished");
            }
        })
    }
}

impl<A: Authenticator> MethodHandler for AccountsService<A> {
    async fn call(&self, ctx: &MethodContext, method: &str, params: &[Value]) -> MethodResult {
        let result = match method {
            methods::LOGIN => self.login(ctx, params).await,
            methods::LOGOUT => self.logout(ctx),
            methods::GET_NEW_TOKEN => self.get_new_token(ctx),
            methods::REMOVE_OTHER_TOKENS => self.remove_other_tokens(ctx),
            other => Err(ServerError::UnknownMethod(other.to_string())),
        };
        result.map_err(|err| {
            warn!(method, connection = %ctx.connection_id, error = %err, "method failed");
            err.into()
        })
    }

    fn connection_closed(&self, connection_id: ConnectionId) {
        if self.state().connections.remove(&connection_id).is_some() {
            debug!(connection = %connection_id, "logged-in connection closed");
        }
    }
}
