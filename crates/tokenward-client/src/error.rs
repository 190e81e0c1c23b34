//! Error types for the client.

use tokenward_protocol::{LOGIN_CANCELLED_CODE, RemoteError};
use tokenward_rpc::RpcError;

/// Why a login (or logout) did not succeed.
///
/// Delivered as a value: to the caller's completion, to
/// `on_login_failure` listeners, and in the page-load login attempt.
/// `Clone` because one failure goes to all of those.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoginError {
    /// The server rejected the call.
    #[error("login rejected: {0}")]
    Remote(RemoteError),

    /// The connection failed before the call completed.
    #[error("transport error: {0}")]
    Transport(RpcError),

    /// The method completed without a result.
    #[error("No result from call to {method}")]
    NoResult { method: String },

    /// The result was well-formed but the caller's validator refused it.
    #[error("login result rejected: {0}")]
    Invalid(String),

    /// The result did not have the `{ id, token, tokenExpires }` shape.
    #[error("malformed login result: {0}")]
    MalformedResult(String),

    /// The user backed out of an interactive login.
    #[error("login cancelled: {description}")]
    Cancelled { description: String },
}

impl LoginError {
    /// The user cancelled the login.
    pub fn cancelled(description: impl Into<String>) -> Self {
        Self::Cancelled {
            description: description.into(),
        }
    }

    /// The numeric wire code, where there is one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Cancelled { .. } => Some(LOGIN_CANCELLED_CODE),
            Self::Remote(err) => err.code(),
            _ => None,
        }
    }

    /// The error as sent over the wire.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            Self::Remote(err) => err.clone(),
            Self::Cancelled { description } => RemoteError::login_cancelled(description.clone()),
            other => RemoteError::new(500, other.to_string()),
        }
    }
}

impl From<RpcError> for LoginError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote(remote) if remote.is_login_cancelled() => Self::Cancelled {
                description: remote.reason.unwrap_or_default(),
            },
            RpcError::Remote(remote) => Self::Remote(remote),
            other => Self::Transport(other),
        }
    }
}

/// Errors from [`SessionTokenManager::configure`](crate::SessionTokenManager::configure).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The option was already set, at construction or by an earlier call.
    #[error("Can't set `{0}` more than once")]
    AlreadySet(&'static str),
}
