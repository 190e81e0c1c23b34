//! Error types for the server side.

use tokenward_protocol::{ProtocolError, RemoteError, UserId};

/// Errors raised while answering a login method.
///
/// Every variant maps onto the [`RemoteError`] the client receives; see
/// the `From` impl below.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The password (or the user it names) was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The resume token is not one we issued, or it was revoked.
    #[error("unknown resume token")]
    TokenNotFound,

    /// The resume token was issued but has expired.
    #[error("resume token for user {0} expired")]
    TokenExpired(UserId),

    /// The method needs a logged-in connection.
    #[error("not logged in")]
    NotLoggedIn,

    /// The method arguments did not decode.
    #[error("bad request: {0}")]
    BadRequest(#[from] ProtocolError),

    /// No such method.
    #[error("unknown method {0}")]
    UnknownMethod(String),
}

impl From<ServerError> for RemoteError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::AuthFailed(reason) => RemoteError::forbidden(reason),
            ServerError::TokenNotFound => RemoteError::forbidden(
                "You've been logged out by the server. Please log in again.",
            ),
            ServerError::TokenExpired(_) => {
                RemoteError::forbidden("Your session has expired. Please log in again.")
            }
            ServerError::NotLoggedIn => RemoteError::forbidden("You are not logged in."),
            ServerError::BadRequest(_) => RemoteError::bad_request("Match failed"),
            ServerError::UnknownMethod(method) => RemoteError::method_not_found(&method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_not_found_maps_to_logged_out_by_server() {
        let remote = RemoteError::from(ServerError::TokenNotFound);
        assert_eq!(remote.code(), Some(403));
        assert_eq!(
            remote.reason.as_deref(),
            Some("You've been logged out by the server. Please log in again.")
        );
    }

    #[test]
    fn test_unknown_method_maps_to_404() {
        let remote = RemoteError::from(ServerError::UnknownMethod("nope".into()));
        assert_eq!(remote.code(), Some(404));
        assert_eq!(remote.reason.as_deref(), Some("Method 'nope' not found"));
    }

    #[test]
    fn test_bad_request_hides_decode_detail() {
        let err = ServerError::BadRequest(ProtocolError::InvalidMessage("x".into()));
        let remote = RemoteError::from(err);
        assert_eq!(remote.code(), Some(400));
        assert_eq!(remote.reason.as_deref(), Some("Match failed"));
    }
}
