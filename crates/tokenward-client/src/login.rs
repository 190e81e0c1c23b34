//! Login call plumbing: per-call options, the completion future, and the
//! once-only completion guard.

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use serde_json::{Value, json};
use tokenward_protocol::{LoginRequest, LoginResult, ResumeToken, methods};
use tokenward_rpc::RpcError;
use tokio::sync::oneshot;
use tracing::error;

use crate::LoginError;

/// Checks a login result before the client accepts it.
pub type ResultValidator = Arc<dyn Fn(&LoginResult) -> Result<(), String> + Send + Sync>;

/// What to call and how, for [`call_login_method`].
///
/// [`call_login_method`]: crate::SessionTokenManager::call_login_method
#[derive(Clone)]
pub struct LoginMethodOptions {
    /// Method to call. Default `login`.
    pub method_name: String,
    /// Its arguments. Default `[{}]`.
    pub method_arguments: Vec<Value>,
    /// Optional extra check of the result.
    pub validate_result: Option<ResultValidator>,
    pub(crate) suppress_logging_in: bool,
}

impl Default for LoginMethodOptions {
    fn default() -> Self {
        Self {
            method_name: methods::LOGIN.into(),
            method_arguments: vec![json!({})],
            validate_result: None,
            suppress_logging_in: false,
        }
    }
}

impl LoginMethodOptions {
    /// Calls `method_name` with `method_arguments`.
    pub fn new(method_name: impl Into<String>, method_arguments: Vec<Value>) -> Self {
        Self {
            method_name: method_name.into(),
            method_arguments,
            ..Self::default()
        }
    }

    /// Calls `login` with `request`.
    pub fn request(request: &LoginRequest) -> Self {
        Self::new(methods::LOGIN, request.to_params())
    }

    /// Calls `login` with a resume token.
    pub fn resume(token: ResumeToken) -> Self {
        Self::request(&LoginRequest::resume(token))
    }

    /// Adds a result validator. An `Err` fails the login with
    /// [`LoginError::Invalid`].
    pub fn with_validator(
        mut self,
        validator: impl Fn(&LoginResult) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validate_result = Some(Arc::new(validator));
        self
    }

    /// Don't show "logging in" for this call.
    pub(crate) fn suppressed(mut self) -> Self {
        self.suppress_logging_in = true;
        self
    }
}

impl fmt::Debug for LoginMethodOptions {
    // Arguments may hold a password.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginMethodOptions")
            .field("method_name", &self.method_name)
            .field("method_arguments", &self.method_arguments.len())
            .field("validate_result", &self.validate_result.is_some())
            .field("suppress_logging_in", &self.suppress_logging_in)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// The outcome of a login or logout, delivered when it completes.
///
/// The operation runs to the end whether or not this is awaited.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Result<(), LoginError>>,
}

impl Completion {
    pub(crate) fn channel() -> (oneshot::Sender<Result<(), LoginError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl Future for Completion {
    type Output = Result<(), LoginError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(LoginError::Transport(RpcError::Disconnected(
                    "login task stopped before completing".into(),
                )))
            })
        })
    }
}

// ---------------------------------------------------------------------------
// LoginCallbacks
// ---------------------------------------------------------------------------

type Finish = Box<dyn FnOnce(Result<(), LoginError>) + Send>;

/// Runs the login completion at most once, however many paths (the
/// original call, reconnect retries) try to finish the same login.
#[derive(Clone)]
pub(crate) struct LoginCallbacks {
    finish: Arc<Mutex<Option<Finish>>>,
}

impl LoginCallbacks {
    pub(crate) fn new(finish: impl FnOnce(Result<(), LoginError>) + Send + 'static) -> Self {
        Self {
            finish: Arc::new(Mutex::new(Some(Box::new(finish)))),
        }
    }

    /// Completes the login. Later calls do nothing; a panicking callback
    /// is logged, not propagated.
    pub(crate) fn fire(&self, outcome: Result<(), LoginError>) {
        let finish = self
            .finish
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(finish) = finish {
            if catch_unwind(AssertUnwindSafe(|| finish(outcome))).is_err() {
                error!("exception in login completion callback");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_default_options_call_login_with_empty_object() {
        let options = LoginMethodOptions::default();
        assert_eq!(options.method_name, "login");
        assert_eq!(options.method_arguments, vec![json!({})]);
        assert!(!options.suppress_logging_in);
    }

    #[test]
    fn test_resume_options_carry_token() {
        let options = LoginMethodOptions::resume(ResumeToken::new("tokA"));
        assert_eq!(options.method_arguments, vec![json!({ "resume": "tokA" })]);
    }

    #[test]
    fn test_debug_does_not_print_arguments() {
        let options = LoginMethodOptions::request(&LoginRequest::password("alice", "hunter2"));
        assert!(!format!("{options:?}").contains("hunter2"));
    }

    #[test]
    fn test_login_callbacks_fire_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let callbacks = LoginCallbacks::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let retry = callbacks.clone();
        callbacks.fire(Ok(()));
        retry.fire(Err(LoginError::cancelled("late")));
        callbacks.fire(Ok(()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_login_callbacks_fire_contains_panicking_callback() {
        let callbacks = LoginCallbacks::new(|_| panic!("completion blew up"));
        let retry = callbacks.clone();

        callbacks.fire(Ok(()));
        retry.fire(Ok(()));
    }

    #[tokio::test]
    async fn test_completion_dropped_sender_is_transport_error() {
        let (tx, completion) = Completion::channel();
        drop(tx);
        assert!(matches!(completion.await, Err(LoginError::Transport(_))));
    }
}
