//! Method-call connections for Tokenward.
//!
//! Provides the [`Connection`] trait the client-side session manager talks
//! through, and the [`MethodHandler`] trait a server implements to answer
//! those calls. [`LocalConnection`] wires the two together in-process.
//!
//! # Ordering
//!
//! A call made with [`ApplyOptions::wait`] set is never interleaved with
//! other calls on the same connection: everything issued before it
//! finishes first, and everything issued after it waits until it is done.
//! Login and logout always use this mode.
//!
//! # Result-received vs. completion
//!
//! A method call has two milestones. The *result* arrives first and fires
//! the optional [`ApplyOptions::on_result_received`] hook; then the
//! [`PendingMethod`] future resolves once the data the method wrote is
//! visible locally. Connections must fire the hook before resolving.

mod error;
mod local;

pub use error::RpcError;
pub use local::LocalConnection;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokenward_protocol::{RemoteError, UserId};
use tokio::sync::oneshot;

/// What a method call finally produces, as seen by the caller.
pub type MethodOutcome = Result<Value, RpcError>;

/// What a [`MethodHandler`] returns for one call.
pub type MethodResult = Result<Value, RemoteError>;

/// Invoked with the raw outcome as soon as it arrives.
pub type ResultHook = Box<dyn FnOnce(&MethodOutcome) + Send>;

/// Invoked each time the connection re-establishes itself.
pub type ReconnectHook = Arc<dyn Fn() + Send + Sync>;

/// Opaque identifier for one server-side session of a connection.
///
/// A reconnect starts a new session, so it gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Per-call options for [`Connection::apply`].
#[derive(Default)]
pub struct ApplyOptions {
    /// Run this call in ordering-guaranteed mode.
    pub wait: bool,
    /// Fired with the raw outcome before the call completes.
    pub on_result_received: Option<ResultHook>,
}

impl ApplyOptions {
    /// Options for an ordering-guaranteed call.
    pub fn wait() -> Self {
        Self {
            wait: true,
            on_result_received: None,
        }
    }

    /// Adds a result-received hook.
    pub fn on_result_received(mut self, hook: impl FnOnce(&MethodOutcome) + Send + 'static) -> Self {
        self.on_result_received = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for ApplyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyOptions")
            .field("wait", &self.wait)
            .field("on_result_received", &self.on_result_received.is_some())
            .finish()
    }
}

/// A method call in flight. Resolves when the call completes.
///
/// If the connection drops the completion side, this resolves to
/// [`RpcError::Disconnected`] instead of hanging.
#[derive(Debug)]
pub struct PendingMethod {
    rx: oneshot::Receiver<MethodOutcome>,
}

impl PendingMethod {
    /// Creates a pending call and the sender that completes it.
    pub fn channel() -> (oneshot::Sender<MethodOutcome>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A call that has already completed.
    pub fn ready(outcome: MethodOutcome) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(outcome);
        pending
    }
}

impl Future for PendingMethod {
    type Output = MethodOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(RpcError::Disconnected("method call dropped before completing".into()))
            })
        })
    }
}

/// The client's view of a connection to a server that answers methods.
///
/// Implementations must call the reconnect hook *before* resending or
/// completing anything else after a reconnect, so a login issued from the
/// hook is the first thing the new server session sees.
pub trait Connection: Send + Sync + 'static {
    /// Calls `method` on the server.
    fn apply(&self, method: &str, params: Vec<Value>, options: ApplyOptions) -> PendingMethod;

    /// Installs (or with `None`, removes) the reconnect hook.
    fn set_on_reconnect(&self, hook: Option<ReconnectHook>);

    /// Records which user this connection is logged in as.
    fn set_user_id(&self, user_id: Option<UserId>);

    /// The user this connection is logged in as.
    fn user_id(&self) -> Option<UserId>;

    /// The server URL this connection talks to.
    fn url(&self) -> &str;
}

impl<C: Connection> Connection for Arc<C> {
    fn apply(&self, method: &str, params: Vec<Value>, options: ApplyOptions) -> PendingMethod {
        (**self).apply(method, params, options)
    }

    fn set_on_reconnect(&self, hook: Option<ReconnectHook>) {
        (**self).set_on_reconnect(hook)
    }

    fn set_user_id(&self, user_id: Option<UserId>) {
        (**self).set_user_id(user_id)
    }

    fn user_id(&self) -> Option<UserId> {
        (**self).user_id()
    }

    fn url(&self) -> &str {
        (**self).url()
    }
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// What a handler knows about the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodContext {
    /// The server-side session the call arrived on.
    pub connection_id: ConnectionId,
}

/// Answers method calls. Implemented by servers.
pub trait MethodHandler: Send + Sync + 'static {
    /// Runs one method call.
    fn call(
        &self,
        ctx: &MethodContext,
        method: &str,
        params: &[Value],
    ) -> impl Future<Output = MethodResult> + Send;

    /// A server-side session ended (disconnect or reconnect).
    fn connection_closed(&self, _connection_id: ConnectionId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
        assert_eq!(id.into_inner(), 7);
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }

    #[tokio::test]
    async fn test_pending_method_ready_resolves_immediately() {
        let outcome = PendingMethod::ready(Ok(Value::from(3))).await;
        assert_eq!(outcome.unwrap(), Value::from(3));
    }

    #[tokio::test]
    async fn test_pending_method_dropped_sender_is_disconnected() {
        let (tx, pending) = PendingMethod::channel();
        drop(tx);
        assert!(matches!(pending.await, Err(RpcError::Disconnected(_))));
    }

    #[test]
    fn test_apply_options_debug_hides_hook() {
        let options = ApplyOptions::wait().on_result_received(|_| {});
        let text = format!("{options:?}");
        assert!(text.contains("wait: true"));
        assert!(text.contains("on_result_received: true"));
    }
}
