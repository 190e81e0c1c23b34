//! Unified error type for Tokenward.

use tokenward_client::{ConfigError, LoginError};
use tokenward_protocol::ProtocolError;
use tokenward_rpc::RpcError;
use tokenward_server::ServerError;
use tokenward_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tokenward` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant generates the `From` impls, so `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TokenwardError {
    /// Decoding a wire value or stored document failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The key/value store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A method call failed in transit or on the server.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The accounts service refused a request.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A login or logout did not succeed.
    #[error(transparent)]
    Login(#[from] LoginError),

    /// A runtime option was set twice.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use tokenward_protocol::RemoteError;

    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err: TokenwardError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, TokenwardError::Protocol(_)));
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_store_error() {
        let err: TokenwardError = StoreError::Poisoned.into();
        assert!(matches!(err, TokenwardError::Store(_)));
    }

    #[test]
    fn test_from_rpc_error() {
        let err: TokenwardError = RpcError::Disconnected("gone".into()).into();
        assert!(matches!(err, TokenwardError::Rpc(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_server_error() {
        let err: TokenwardError = ServerError::NotLoggedIn.into();
        assert!(matches!(err, TokenwardError::Server(_)));
    }

    #[test]
    fn test_from_login_error() {
        let err: TokenwardError = LoginError::Remote(RemoteError::forbidden("Incorrect password")).into();
        assert!(matches!(err, TokenwardError::Login(_)));
        assert!(err.to_string().contains("Incorrect password"));
    }

    #[test]
    fn test_from_config_error() {
        let err: TokenwardError = ConfigError::AlreadySet("login_expiration_days").into();
        assert_eq!(err.to_string(), "Can't set `login_expiration_days` more than once");
    }
}
