use tokenward_protocol::RemoteError;

/// Errors that can occur when calling a method over a connection.
///
/// `Clone` because the same outcome is handed to a result-received hook
/// by reference and then to the caller by value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// The server ran the method and it failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The connection went away before the method completed.
    #[error("connection closed: {0}")]
    Disconnected(String),
}

impl RpcError {
    /// The server-side error, if this is one.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(err) => Some(err),
            Self::Disconnected(_) => None,
        }
    }
}
