//! Client-side session token manager for Tokenward.
//!
//! A [`SessionTokenManager`] sits between an app and its
//! [`Connection`](tokenward_rpc::Connection) to an accounts server. It
//! keeps the login token in a [`KeyValueStore`](tokenward_store::KeyValueStore)
//! so the user stays logged in across restarts, and watches that store
//! so every tab (every manager sharing the store) follows a login or
//! logout made in any one of them.
//!
//! # Architecture
//!
//! ```text
//! App ──→ SessionTokenManager ──→ Connection ──→ accounts server
//!                │    ▲
//!                ▼    │ poll (3s)
//!             KeyValueStore  ←── other tabs
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = SessionTokenManager::new(connection, store, ClientConfig::default());
//! manager.on_login(|| tracing::info!("welcome back"));
//! manager.start();
//!
//! manager.login_with_password("alice", "s3cret").await?;
//! ```

mod attempt;
mod config;
mod error;
mod hooks;
mod keys;
mod links;
mod login;
mod manager;

pub use attempt::LoginAttempt;
pub use config::{AccountsOptions, ClientConfig, DEFAULT_POLL_INTERVAL};
pub use error::{ConfigError, LoginError};
pub use hooks::{Hook, HookHandle};
pub use keys::{StorageKeys, random_id};
pub use links::{AccountsLink, LinkKind, parse_fragment};
pub use login::{Completion, LoginMethodOptions, ResultValidator};
pub use manager::{LinkDone, SessionTokenManager};
