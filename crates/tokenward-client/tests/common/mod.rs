//! A connection whose calls the test answers by hand.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokenward_client::{ClientConfig, SessionTokenManager};
use tokenward_protocol::UserId;
use tokenward_rpc::{ApplyOptions, Connection, MethodOutcome, PendingMethod, ReconnectHook, ResultHook};
use tokenward_store::MemoryStore;
use tokio::sync::oneshot;

pub type Manager = SessionTokenManager<Arc<ScriptedConnection>, Arc<MemoryStore>>;

struct Call {
    method: String,
    params: Vec<Value>,
    wait: bool,
    hook: Option<ResultHook>,
    tx: Option<oneshot::Sender<MethodOutcome>>,
}

/// Records every call. Calls with a canned response complete at once;
/// the rest wait for [`resolve`](Self::resolve).
#[derive(Default)]
pub struct ScriptedConnection {
    calls: Mutex<Vec<Call>>,
    canned: Mutex<HashMap<String, MethodOutcome>>,
    on_reconnect: Mutex<Option<ReconnectHook>>,
    user_id: Mutex<Option<UserId>>,
}

impl ScriptedConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers every later call to `method` with `outcome`.
    pub fn respond(&self, method: &str, outcome: MethodOutcome) {
        self.canned.lock().unwrap().insert(method.to_string(), outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.method.clone()).collect()
    }

    pub fn params(&self, index: usize) -> Vec<Value> {
        self.calls.lock().unwrap()[index].params.clone()
    }

    pub fn waited(&self, index: usize) -> bool {
        self.calls.lock().unwrap()[index].wait
    }

    /// Fires the result-received hook of call `index` only.
    pub fn receive_result(&self, index: usize, outcome: &MethodOutcome) {
        let hook = self.calls.lock().unwrap()[index].hook.take();
        if let Some(hook) = hook {
            hook(outcome);
        }
    }

    /// Completes call `index`, firing its hook first if it hasn't fired.
    pub fn resolve(&self, index: usize, outcome: MethodOutcome) {
        self.receive_result(index, &outcome);
        let tx = self.calls.lock().unwrap()[index].tx.take();
        if let Some(tx) = tx {
            let _ = tx.send(outcome);
        }
    }

    /// Simulates a reconnect: runs the reconnect hook, if any.
    pub fn reconnect(&self) {
        let hook = self.on_reconnect.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub fn has_reconnect_hook(&self) -> bool {
        self.on_reconnect.lock().unwrap().is_some()
    }
}

impl Connection for ScriptedConnection {
    fn apply(&self, method: &str, params: Vec<Value>, options: ApplyOptions) -> PendingMethod {
        let canned = self.canned.lock().unwrap().get(method).cloned();
        if let Some(outcome) = canned {
            self.calls.lock().unwrap().push(Call {
                method: method.to_string(),
                params,
                wait: options.wait,
                hook: None,
                tx: None,
            });
            if let Some(hook) = options.on_result_received {
                hook(&outcome);
            }
            return PendingMethod::ready(outcome);
        }

        let (tx, pending) = PendingMethod::channel();
        self.calls.lock().unwrap().push(Call {
            method: method.to_string(),
            params,
            wait: options.wait,
            hook: options.on_result_received,
            tx: Some(tx),
        });
        pending
    }

    fn set_on_reconnect(&self, hook: Option<ReconnectHook>) {
        *self.on_reconnect.lock().unwrap() = hook;
    }

    fn set_user_id(&self, user_id: Option<UserId>) {
        *self.user_id.lock().unwrap() = user_id;
    }

    fn user_id(&self) -> Option<UserId> {
        self.user_id.lock().unwrap().clone()
    }

    fn url(&self) -> &str {
        "ws://accounts.test"
    }
}

/// A manager over a fresh scripted connection. Polling is off; tests
/// poll by hand.
pub fn manager(store: &Arc<MemoryStore>) -> (Manager, Arc<ScriptedConnection>) {
    manager_with(store, ClientConfig::default())
}

pub fn manager_with(store: &Arc<MemoryStore>, config: ClientConfig) -> (Manager, Arc<ScriptedConnection>) {
    let connection = ScriptedConnection::new();
    let config = ClientConfig {
        poll_interval: std::time::Duration::ZERO,
        ..config
    };
    let manager = SessionTokenManager::new(Arc::clone(&connection), Arc::clone(store), config);
    (manager, connection)
}

/// A successful login result.
pub fn login_ok(user: &str, token: &str) -> MethodOutcome {
    Ok(json!({ "id": user, "token": token }))
}

/// Lets spawned tasks run to their next await.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
