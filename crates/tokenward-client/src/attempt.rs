//! The page-load login attempt.
//!
//! A login can start before the code that cares about it has loaded: the
//! silent resume login runs as soon as the manager starts. The outcome
//! of that one attempt is kept here until someone asks for it with
//! `on_page_load_login`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokenward_protocol::{LoginRequest, ResumeToken, methods};
use tracing::{debug, error};

use crate::LoginError;

/// The outcome of a login attempt made on the user's behalf.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    /// Login flavor; `"resume"` for the silent login.
    pub kind: String,
    /// Whether the login succeeded.
    pub allowed: bool,
    /// Why it failed.
    pub error: Option<LoginError>,
    /// The method called.
    pub method_name: String,
    /// Its argument.
    pub request: LoginRequest,
}

impl LoginAttempt {
    /// A resume-token login attempt with the given outcome.
    pub fn resume(token: ResumeToken, error: Option<LoginError>) -> Self {
        Self {
            kind: "resume".into(),
            allowed: error.is_none(),
            error,
            method_name: methods::LOGIN.into(),
            request: LoginRequest::resume(token),
        }
    }
}

type Waiter = Box<dyn FnOnce(&LoginAttempt) + Send>;

#[derive(Default)]
struct SlotState {
    recorded: bool,
    buffered: Option<LoginAttempt>,
    waiting: Vec<Waiter>,
}

/// Holds the one page-load attempt and whoever is waiting for it.
///
/// Callbacks registered before the attempt is recorded all receive it.
/// If nobody is registered yet, the attempt is buffered for the first
/// registration only.
#[derive(Default)]
pub(crate) struct PageLoadSlot {
    state: Mutex<SlotState>,
}

impl PageLoadSlot {
    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, callback: Waiter) {
        let mut state = self.state();
        if let Some(attempt) = state.buffered.take() {
            drop(state);
            deliver(callback, &attempt);
        } else if state.recorded {
            debug!("page load login attempt already delivered");
        } else {
            state.waiting.push(callback);
        }
    }

    /// Records the attempt. Only the first call per manager has any
    /// effect.
    pub(crate) fn record(&self, attempt: LoginAttempt) {
        let mut state = self.state();
        if state.recorded {
            debug!("Ignoring unexpected duplicate page load login attempt info");
            return;
        }
        state.recorded = true;
        let waiting = std::mem::take(&mut state.waiting);
        if waiting.is_empty() {
            state.buffered = Some(attempt);
            return;
        }
        drop(state);
        for callback in waiting {
            deliver(callback, &attempt);
        }
    }

    pub(crate) fn is_recorded(&self) -> bool {
        self.state().recorded
    }
}

fn deliver(callback: Waiter, attempt: &LoginAttempt) {
    if catch_unwind(AssertUnwindSafe(|| callback(attempt))).is_err() {
        error!("exception in page load login callback");
    }
}
