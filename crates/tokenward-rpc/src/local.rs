//! In-process [`Connection`] that calls a [`MethodHandler`] directly.
//!
//! Calls go through an unbounded queue to a worker task, which is what
//! gives wait-mode calls their ordering: the worker finishes every earlier
//! call before running a wait call, and runs nothing else until it is done.
//! Non-wait calls are spawned and may overlap each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokenward_protocol::UserId;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::{
    ApplyOptions, Connection, ConnectionId, MethodContext, MethodHandler, MethodOutcome,
    PendingMethod, ReconnectHook, ResultHook, RpcError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

struct Call {
    method: String,
    params: Vec<Value>,
    wait: bool,
    on_result_received: Option<ResultHook>,
    reply: oneshot::Sender<MethodOutcome>,
}

enum Command {
    Call(Call),
    /// Ends the current server session and starts `next`.
    Reset { next: ConnectionId },
}

/// Client-side state shared between the handle and its clones.
struct Shared {
    url: String,
    user_id: Mutex<Option<UserId>>,
    on_reconnect: Mutex<Option<ReconnectHook>>,
    session: Mutex<ConnectionId>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connection to a [`MethodHandler`] in the same process.
///
/// Cheap to clone; clones share one worker and one server session.
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct LocalConnection {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Command>,
}

impl LocalConnection {
    /// Connects to `handler`, spawning the worker task.
    pub fn connect<H: MethodHandler>(handler: Arc<H>, url: impl Into<String>) -> Self {
        let url = url.into();
        let id = next_connection_id();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(handler, rx, id));
        debug!(%id, %url, "local connection opened");

        Self {
            shared: Arc::new(Shared {
                url,
                user_id: Mutex::new(None),
                on_reconnect: Mutex::new(None),
                session: Mutex::new(id),
            }),
            tx,
        }
    }

    /// The current server-side session id.
    pub fn connection_id(&self) -> ConnectionId {
        *lock(&self.shared.session)
    }

    /// Simulates the connection dropping and coming back.
    ///
    /// The server sees the old session end and a new one begin. The
    /// reconnect hook runs synchronously, before this returns, so any call
    /// it makes is queued ahead of calls made afterwards.
    pub fn reconnect(&self) {
        let next = next_connection_id();
        let previous = std::mem::replace(&mut *lock(&self.shared.session), next);
        debug!(%previous, %next, url = %self.shared.url, "local connection reconnecting");
        let _ = self.tx.send(Command::Reset { next });

        let hook = lock(&self.shared.on_reconnect).clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl Connection for LocalConnection {
    fn apply(&self, method: &str, params: Vec<Value>, options: ApplyOptions) -> PendingMethod {
        let (reply, pending) = PendingMethod::channel();
        trace!(method, wait = options.wait, "queueing method call");
        let call = Call {
            method: method.to_string(),
            params,
            wait: options.wait,
            on_result_received: options.on_result_received,
            reply,
        };
        if let Err(mpsc::error::SendError(Command::Call(call))) = self.tx.send(Command::Call(call)) {
            deliver(call, Err(RpcError::Disconnected("connection worker stopped".into())));
        }
        pending
    }

    fn set_on_reconnect(&self, hook: Option<ReconnectHook>) {
        *lock(&self.shared.on_reconnect) = hook;
    }

    fn set_user_id(&self, user_id: Option<UserId>) {
        debug!(user_id = ?user_id.as_ref().map(UserId::as_str), "connection user changed");
        *lock(&self.shared.user_id) = user_id;
    }

    fn user_id(&self) -> Option<UserId> {
        lock(&self.shared.user_id).clone()
    }

    fn url(&self) -> &str {
        &self.shared.url
    }
}

impl std::fmt::Debug for LocalConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalConnection")
            .field("url", &self.shared.url)
            .field("connection_id", &self.connection_id())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Fires the result hook, then completes the call.
fn deliver(call: Call, outcome: MethodOutcome) {
    if let Some(hook) = call.on_result_received {
        hook(&outcome);
    }
    let _ = call.reply.send(outcome);
}

async fn invoke<H: MethodHandler>(
    handler: &H,
    id: ConnectionId,
    method: &str,
    params: &[Value],
) -> MethodOutcome {
    let ctx = MethodContext { connection_id: id };
    handler.call(&ctx, method, params).await.map_err(RpcError::Remote)
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while in_flight.join_next().await.is_some() {}
}

async fn run_worker<H: MethodHandler>(
    handler: Arc<H>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    mut id: ConnectionId,
) {
    let mut in_flight = JoinSet::new();

    while let Some(command) = rx.recv().await {
        match command {
            Command::Call(call) if call.wait => {
                drain(&mut in_flight).await;
                let outcome = invoke(handler.as_ref(), id, &call.method, &call.params).await;
                trace!(method = %call.method, ok = outcome.is_ok(), "wait call finished");
                deliver(call, outcome);
            }
            Command::Call(call) => {
                let handler = Arc::clone(&handler);
                in_flight.spawn(async move {
                    let outcome = invoke(handler.as_ref(), id, &call.method, &call.params).await;
                    deliver(call, outcome);
                });
            }
            Command::Reset { next } => {
                drain(&mut in_flight).await;
                handler.connection_closed(id);
                id = next;
            }
        }
        while in_flight.try_join_next().is_some() {}
    }

    drain(&mut in_flight).await;
    handler.connection_closed(id);
    debug!(%id, "local connection closed");
}
