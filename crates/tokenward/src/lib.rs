//! # Tokenward
//!
//! Login token lifecycle and cross-tab session reconciliation.
//!
//! A client keeps its login ("resume") token in a durable key/value
//! store, logs in with it silently on start, re-authenticates after a
//! reconnect, and notices within seconds when another tab sharing the
//! store logs in or out. This crate re-exports the pieces:
//!
//! - `tokenward-client`: the [`SessionTokenManager`]
//! - `tokenward-store`: [`MemoryStore`], [`FileStore`]
//! - `tokenward-rpc`: the [`Connection`] trait and [`LocalConnection`]
//! - `tokenward-server`: the [`AccountsService`] that answers the login
//!   methods
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tokenward::prelude::*;
//!
//! # async fn run() -> Result<(), TokenwardError> {
//! let table = PasswordTable::new().with_user("alice", "u1", "hunter2");
//! let service = Arc::new(AccountsService::new(table, ServiceConfig::default()));
//!
//! let tab = AccountsClientBuilder::new().build(&service, MemoryStore::new());
//! tab.start();
//! tab.login_with_password("alice", "hunter2").await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
mod logging;

pub use builder::AccountsClientBuilder;
pub use error::TokenwardError;
pub use logging::init_logging;

pub use tokenward_client::{
    AccountsLink, AccountsOptions, ClientConfig, Completion, ConfigError, LinkDone, LinkKind,
    LoginAttempt, LoginError, LoginMethodOptions, SessionTokenManager,
};
pub use tokenward_protocol::{LoginRequest, LoginResult, RemoteError, ResumeToken, TokenLifetime, UserId};
pub use tokenward_rpc::{Connection, LocalConnection, MethodHandler, RpcError};
pub use tokenward_server::{AccountsService, Authenticator, PasswordTable, ServerError, ServiceConfig};
pub use tokenward_store::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// Everything an app needs, in one import.
pub mod prelude {
    pub use std::sync::Arc;
    pub use std::time::Duration;

    pub use crate::{
        AccountsClientBuilder, AccountsService, ClientConfig, FileStore, KeyValueStore, LoginError,
        LoginMethodOptions, MemoryStore, PasswordTable, ResumeToken, ServiceConfig,
        SessionTokenManager, TokenwardError, UserId, init_logging,
    };
}
