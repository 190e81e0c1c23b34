//! The session token manager.
//!
//! Owns the locally stored session (user id, resume token, expiry), logs
//! in with it silently on start, and keeps several tabs that share one
//! store in agreement:
//!
//! ```text
//!             start()
//!                │
//!   attempt_silent_login ──→ login_with_token ──→ store_session
//!                │                   │ (fail)
//!                │                   └──────────→ clear_session
//!                ▼
//!   every 3s: poll_stored_token
//!        stored token changed?  ── new token ──→ login_with_token
//!                               └─ removed  ──→ logout
//! ```
//!
//! Every login goes through [`SessionTokenManager::call_login_method`],
//! which also arranges for the login to be redone after the connection
//! reconnects.
//!
//! # Runtime
//!
//! Completions are driven by spawned tasks, so the manager must be used
//! from inside a tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use tokenward_poll::PollScheduler;
use tokenward_protocol::{LoginRequest, LoginResult, ResumeToken, TokenGrant, TokenLifetime, UserId, methods};
use tokenward_rpc::{ApplyOptions, Connection, MethodOutcome};
use tokenward_store::KeyValueStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::attempt::PageLoadSlot;
use crate::hooks::{Hook, HookHandle};
use crate::keys;
use crate::links::{AccountsLink, LinkKind, parse_fragment};
use crate::login::{Completion, LoginCallbacks, LoginMethodOptions};
use crate::{AccountsOptions, ClientConfig, ConfigError, LoginAttempt, LoginError, StorageKeys};

type LinkCallback = Box<dyn FnOnce(String, LinkDone) + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory login state. Never persisted.
struct LoginState {
    /// The stored token as of the last poll. `None` = absent.
    last_polled: Option<String>,
    auto_login_enabled: bool,
    pending_link: Option<AccountsLink>,
    link_callbacks: HashMap<LinkKind, LinkCallback>,
}

struct Inner<C, S> {
    connection: C,
    store: S,
    config: ClientConfig,
    options: Mutex<AccountsOptions>,
    keys: Mutex<StorageKeys>,
    state: Mutex<LoginState>,
    logging_in: watch::Sender<bool>,
    on_login: Hook<()>,
    on_login_failure: Hook<LoginError>,
    page_load: PageLoadSlot,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C, S> Drop for Inner<C, S> {
    fn drop(&mut self) {
        let task = self
            .poll_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

impl<C, S> TokenLifetime for Inner<C, S> {
    fn login_expiration_days(&self) -> Option<u32> {
        lock(&self.options).login_expiration_days
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

// Storage is best effort: a failed read counts as "absent" and a failed
// write is logged and otherwise ignored.
impl<C: Connection, S: KeyValueStore> Inner<C, S> {
    fn state(&self) -> MutexGuard<'_, LoginState> {
        lock(&self.state)
    }

    fn keys(&self) -> StorageKeys {
        lock(&self.keys).clone()
    }

    fn read(&self, key: &str) -> Option<String> {
        self.store.get_item(key).unwrap_or_else(|err| {
            warn!(key, error = %err, "storage read failed, treating as absent");
            None
        })
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(err) = self.store.set_item(key, value) {
            warn!(key, error = %err, "storage write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.store.remove_item(key) {
            warn!(key, error = %err, "storage remove failed");
        }
    }

    /// The stored token exactly as stored, empty string included.
    fn stored_token_raw(&self) -> Option<String> {
        self.read(&self.keys().login_token)
    }

    fn stored_user_id(&self) -> Option<UserId> {
        self.read(&self.keys().user_id).map(UserId::from)
    }

    fn stored_expires(&self) -> Option<DateTime<Utc>> {
        let raw = self.read(&self.keys().login_token_expires)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(when) => Some(when.with_timezone(&Utc)),
            Err(err) => {
                warn!(error = %err, "stored token expiry unreadable, ignoring it");
                None
            }
        }
    }

    fn store_session(&self, user_id: &UserId, token: &ResumeToken, expires: Option<DateTime<Utc>>) {
        let keys = self.keys();
        let expires = expires.unwrap_or_else(|| self.token_expiration(Utc::now()));
        self.write(&keys.user_id, user_id.as_str());
        self.write(&keys.login_token, token.as_str());
        self.write(
            &keys.login_token_expires,
            &expires.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        // Our own write is not an external change.
        self.state().last_polled = Some(token.as_str().to_string());
    }

    fn clear_session(&self) {
        let keys = self.keys();
        self.remove(&keys.user_id);
        self.remove(&keys.login_token);
        self.remove(&keys.login_token_expires);
        self.state().last_polled = None;
    }

    fn unstore_login_token_if_expires_soon(&self) {
        if let Some(expires) = self.stored_expires() {
            if self.token_expires_soon(expires) {
                debug!(%expires, "stored token expires soon, discarding it");
                self.clear_session();
            }
        }
    }

    fn make_client_logged_in(&self, result: &LoginResult) {
        self.store_session(&result.id, &result.token, result.token_expires);
        self.connection.set_user_id(Some(result.id.clone()));
    }

    fn make_client_logged_out(&self) {
        self.clear_session();
        self.connection.set_user_id(None);
        self.connection.set_on_reconnect(None);
    }

    fn auto_login_enabled(&self) -> bool {
        self.state().auto_login_enabled
    }

    fn set_logging_in(&self, value: bool) {
        self.logging_in.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    fn notify(&self, outcome: &Result<(), LoginError>) {
        match outcome {
            Ok(()) => self.on_login.each(&()),
            Err(err) => self.on_login_failure.each(err),
        }
    }
}

// ---------------------------------------------------------------------------
// The login round trip
// ---------------------------------------------------------------------------

impl<C: Connection, S: KeyValueStore> Inner<C, S> {
    fn call_login_method_with(
        self: &Arc<Self>,
        options: LoginMethodOptions,
        callback: impl FnOnce(Result<(), LoginError>) + Send + 'static,
    ) {
        // The callbacks end up inside the connection's reconnect hook, which
        // `self` owns, so they only hold a weak reference back.
        let weak = Arc::downgrade(self);
        let callbacks = LoginCallbacks::new(move |outcome| {
            if let Some(inner) = weak.upgrade() {
                inner.notify(&outcome);
            }
            callback(outcome);
        });
        let reconnected = Arc::new(AtomicBool::new(false));

        let on_result = {
            let weak = Arc::downgrade(self);
            let callbacks = callbacks.clone();
            let reconnected = Arc::clone(&reconnected);
            move |outcome: &MethodOutcome| {
                // On error the existing hook stays, so a user who was
                // already logged in still resumes after a reconnect.
                let Ok(value) = outcome else { return };
                let Ok(result) = LoginResult::from_value(value.clone()) else {
                    return;
                };
                if let Some(inner) = weak.upgrade() {
                    inner.install_reconnect_hook(result, callbacks, reconnected);
                }
            }
        };

        if !options.suppress_logging_in {
            self.set_logging_in(true);
        }
        debug!(method = %options.method_name, "calling login method");
        let pending = self.connection.apply(
            &options.method_name,
            options.method_arguments.clone(),
            ApplyOptions::wait().on_result_received(on_result),
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = pending.await;
            inner.finish_login(outcome, &options, &callbacks, &reconnected);
        });
    }

    fn install_reconnect_hook(
        self: &Arc<Self>,
        result: LoginResult,
        callbacks: LoginCallbacks,
        reconnected: Arc<AtomicBool>,
    ) {
        let latest = Mutex::new((result.token, result.token_expires));
        let weak = Arc::downgrade(self);
        self.connection.set_on_reconnect(Some(Arc::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            reconnected.store(true, Ordering::SeqCst);
            inner.resume_after_reconnect(&latest, &callbacks);
        })));
        debug!("reconnect hook installed");
    }

    fn resume_after_reconnect(
        self: &Arc<Self>,
        latest: &Mutex<(ResumeToken, Option<DateTime<Utc>>)>,
        callbacks: &LoginCallbacks,
    ) {
        let (token, expires) = {
            let mut latest = lock(latest);
            // Another tab may have stored a newer token since.
            if let Some(stored) = self.stored_token_raw().filter(|t| !t.is_empty()) {
                *latest = (ResumeToken::new(stored), self.stored_expires());
            }
            let expires = *latest
                .1
                .get_or_insert_with(|| self.token_expiration(Utc::now()));
            (latest.0.clone(), expires)
        };

        if self.token_expires_soon(expires) {
            debug!("token expires soon, not resuming after reconnect");
            self.make_client_logged_out();
            return;
        }

        info!("resuming login after reconnect");
        let weak = Arc::downgrade(self);
        let callbacks = callbacks.clone();
        let tried = token.clone();
        self.call_login_method_with(
            LoginMethodOptions::resume(token).suppressed(),
            move |outcome| {
                if let (Err(_), Some(inner)) = (&outcome, weak.upgrade()) {
                    // A different stored token is left for the poll to judge.
                    if inner.stored_token_raw().as_deref() == Some(tried.as_str()) {
                        inner.make_client_logged_out();
                    }
                }
                callbacks.fire(outcome);
            },
        );
    }

    fn finish_login(
        &self,
        outcome: MethodOutcome,
        options: &LoginMethodOptions,
        callbacks: &LoginCallbacks,
        reconnected: &AtomicBool,
    ) {
        // The reconnect retry finishes this login instead.
        if reconnected.load(Ordering::SeqCst) {
            return;
        }

        // Even when suppressed: this may pair with a `true` set by an
        // earlier half-finished login.
        self.set_logging_in(false);

        let result = outcome
            .map_err(LoginError::from)
            .and_then(|value| {
                if value.is_null() {
                    return Err(LoginError::NoResult {
                        method: options.method_name.clone(),
                    });
                }
                LoginResult::from_value(value).map_err(|e| LoginError::MalformedResult(e.to_string()))
            })
            .and_then(|result| {
                if let Some(validate) = &options.validate_result {
                    validate(&result).map_err(LoginError::Invalid)?;
                }
                Ok(result)
            });

        match result {
            Ok(result) => {
                self.make_client_logged_in(&result);
                info!(user_id = %result.id, method = %options.method_name, "logged in");
                callbacks.fire(Ok(()));
            }
            Err(err) => {
                info!(error = %err, method = %options.method_name, "login failed");
                callbacks.fire(Err(err));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SessionTokenManager
// ---------------------------------------------------------------------------

/// Keeps the login token of one connection, across restarts and tabs.
///
/// Cheap to clone; clones share all state.
pub struct SessionTokenManager<C, S> {
    inner: Arc<Inner<C, S>>,
}

impl<C, S> Clone for SessionTokenManager<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, S> TokenLifetime for SessionTokenManager<C, S> {
    fn login_expiration_days(&self) -> Option<u32> {
        self.inner.login_expiration_days()
    }
}

impl<C: Connection, S: KeyValueStore> SessionTokenManager<C, S> {
    /// Creates a manager. Nothing is read or called until [`start`].
    ///
    /// An accounts link in `config.url_fragment` suspends auto-login until
    /// its callback says it is done.
    ///
    /// [`start`]: Self::start
    pub fn new(connection: C, store: S, config: ClientConfig) -> Self {
        let keys = StorageKeys::for_config(&config, connection.url());
        let pending_link = config.url_fragment.as_deref().and_then(parse_fragment);
        if let Some(link) = &pending_link {
            info!(kind = %link.kind, "accounts link in URL, suspending auto-login");
        }
        let auto_login_enabled = config.auto_login && pending_link.is_none();
        let options = AccountsOptions {
            login_expiration_days: config.login_expiration_days,
        };
        let (logging_in, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                connection,
                store,
                config,
                options: Mutex::new(options),
                keys: Mutex::new(keys),
                state: Mutex::new(LoginState {
                    last_polled: None,
                    auto_login_enabled,
                    pending_link,
                    link_callbacks: HashMap::new(),
                }),
                logging_in,
                on_login: Hook::new("on_login"),
                on_login_failure: Hook::new("on_login_failure"),
                page_load: PageLoadSlot::default(),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Starts the manager: the silent login, the stored-token poll, and
    /// the accounts-link callback if the URL had a link.
    ///
    /// Calling it again restarts the poll timer. The returned handle
    /// resolves to the silent login attempt, if one was made.
    pub fn start(&self) -> JoinHandle<Option<LoginAttempt>> {
        let silent = self.attempt_silent_login();
        self.restart_poll_timer();
        self.dispatch_pending_link();
        silent
    }

    fn restart_poll_timer(&self) {
        let weak = Arc::downgrade(&self.inner);
        let mut scheduler = PollScheduler::every(self.inner.config.poll_interval);
        let task = tokio::spawn(async move {
            loop {
                scheduler.wait_for_poll().await;
                let Some(inner) = weak.upgrade() else { break };
                // Detached: a call that never answers must not stall the
                // next tick.
                SessionTokenManager { inner }.check_stored_token();
            }
        });
        let previous = lock(&self.inner.poll_task).replace(task);
        if let Some(previous) = previous {
            previous.abort();
            debug!("stored-token poll restarted");
        }
    }

    // -- Session record -----------------------------------------------------

    /// Writes the session record. Without `expires`, the token expires
    /// one lifetime from now.
    pub fn store_session(&self, user_id: &UserId, token: &ResumeToken, expires: Option<DateTime<Utc>>) {
        self.inner.store_session(user_id, token, expires);
    }

    /// Deletes the session record.
    pub fn clear_session(&self) {
        self.inner.clear_session();
    }

    /// The stored user id.
    pub fn stored_user_id(&self) -> Option<UserId> {
        self.inner.stored_user_id()
    }

    /// The stored resume token.
    pub fn stored_login_token(&self) -> Option<ResumeToken> {
        self.inner.stored_token_raw().map(ResumeToken::new)
    }

    /// The stored token expiry.
    pub fn stored_login_token_expires(&self) -> Option<DateTime<Utc>> {
        self.inner.stored_expires()
    }

    /// The stored token as of the last poll.
    pub fn last_polled_token(&self) -> Option<ResumeToken> {
        self.inner.state().last_polled.clone().map(ResumeToken::new)
    }

    /// The storage keys in use.
    pub fn storage_keys(&self) -> StorageKeys {
        self.inner.keys()
    }

    /// Appends a random id to every storage key, so parallel test runs
    /// sharing one store keep separate sessions.
    pub fn isolate_login_token_for_test(&self) {
        let id = keys::random_id();
        let mut keys = lock(&self.inner.keys);
        *keys = keys.isolated(&id);
    }

    // -- Logging in ---------------------------------------------------------

    /// The generic login round trip. Every login flow goes through here.
    ///
    /// The call is issued before this returns. On success the session is
    /// stored and `on_login` listeners run; on failure `on_login_failure`
    /// listeners run. Either way `callback` then runs, exactly once, even
    /// if the connection reconnects mid-login.
    pub fn call_login_method_with(
        &self,
        options: LoginMethodOptions,
        callback: impl FnOnce(Result<(), LoginError>) + Send + 'static,
    ) {
        self.inner.call_login_method_with(options, callback);
    }

    /// [`call_login_method_with`](Self::call_login_method_with), with the
    /// outcome as a future.
    pub fn call_login_method(&self, options: LoginMethodOptions) -> Completion {
        let (tx, completion) = Completion::channel();
        self.inner.call_login_method_with(options, move |outcome| {
            let _ = tx.send(outcome);
        });
        completion
    }

    /// Logs in with a resume token. A failure does not clear the session;
    /// that is up to the caller.
    pub fn login_with_token(&self, token: ResumeToken) -> Completion {
        self.call_login_method(LoginMethodOptions::resume(token))
    }

    /// Logs in with a username and password.
    pub fn login_with_password(&self, username: impl Into<String>, password: impl Into<String>) -> Completion {
        self.call_login_method(LoginMethodOptions::request(&LoginRequest::password(username, password)))
    }

    /// Logs in with the stored token, if auto-login is enabled and there
    /// is one that doesn't expire soon.
    ///
    /// The user is shown as logged in (optimistically) until the server
    /// answers. A failed login clears the session. The outcome is
    /// recorded as the page-load login attempt.
    pub fn attempt_silent_login(&self) -> JoinHandle<Option<LoginAttempt>> {
        let token = if self.inner.auto_login_enabled() {
            self.inner.unstore_login_token_if_expires_soon();
            self.inner.stored_token_raw()
        } else {
            None
        };
        self.inner.state().last_polled = token.clone();

        let login = token.filter(|t| !t.is_empty()).map(|token| {
            if let Some(user_id) = self.inner.stored_user_id() {
                self.inner.connection.set_user_id(Some(user_id));
            }
            let token = ResumeToken::new(token);
            (token.clone(), self.login_with_token(token))
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let (token, login) = login?;
            let error = login.await.err();
            if let Some(err) = &error {
                debug!(error = %err, "Error logging in with token");
                inner.make_client_logged_out();
            }
            let attempt = LoginAttempt::resume(token, error);
            inner.page_load.record(attempt.clone());
            Some(attempt)
        })
    }

    /// Checks whether another tab changed the stored token, and follows:
    /// a new token is logged in with, a removed one means log out.
    ///
    /// Does nothing while auto-login is disabled. Runs on a timer once
    /// started; awaits whatever login or logout it triggers.
    pub async fn poll_stored_token(&self) {
        if let Some(follow_up) = self.check_stored_token() {
            let _ = follow_up.await;
        }
    }

    /// One poll tick. Issues the login or logout right away and returns
    /// the task waiting for its answer, if there was a change.
    fn check_stored_token(&self) -> Option<JoinHandle<()>> {
        if !self.inner.auto_login_enabled() {
            return None;
        }

        let current = self.inner.stored_token_raw();
        let last = std::mem::replace(&mut self.inner.state().last_polled, current.clone());
        if last == current {
            return None;
        }

        let follow_up = match current.filter(|t| !t.is_empty()) {
            Some(token) => {
                debug!("stored token changed, logging in with it");
                let login = self.login_with_token(ResumeToken::new(token));
                let weak = Arc::downgrade(&self.inner);
                tokio::spawn(async move {
                    if let Err(err) = login.await {
                        debug!(error = %err, "login with changed stored token failed");
                        if let Some(inner) = weak.upgrade() {
                            inner.make_client_logged_out();
                        }
                    }
                })
            }
            None => {
                debug!("stored token removed, logging out");
                let logout = self.logout();
                tokio::spawn(async move {
                    if let Err(err) = logout.await {
                        warn!(error = %err, "logout after stored token removal failed");
                    }
                })
            }
        };
        Some(follow_up)
    }

    /// Re-enables auto-login and polls right away.
    pub async fn enable_auto_login(&self) {
        self.inner.state().auto_login_enabled = true;
        self.poll_stored_token().await;
    }

    /// Whether auto-login is enabled.
    pub fn auto_login_enabled(&self) -> bool {
        self.inner.auto_login_enabled()
    }

    // -- Logging out --------------------------------------------------------

    /// Logs out on the server, then clears the local session whether or
    /// not the call succeeded. Resolves with the call's error, if any.
    pub fn logout(&self) -> Completion {
        let (tx, completion) = Completion::channel();
        let pending = self
            .inner
            .connection
            .apply(methods::LOGOUT, Vec::new(), ApplyOptions::wait());
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = pending.await;
            inner.make_client_logged_out();
            match &outcome {
                Ok(_) => info!("logged out"),
                Err(err) => warn!(error = %err, "logout call failed, local session cleared anyway"),
            }
            let _ = tx.send(outcome.map(|_| ()).map_err(LoginError::from));
        });
        completion
    }

    /// Logs out every other client of this user, keeping this one.
    ///
    /// Rotates this client's token, stores the new one, then revokes all
    /// others. Both calls are queued back to back in ordering-guaranteed
    /// mode, so nothing runs between them.
    pub fn logout_other_clients(&self) -> Completion {
        let (tx, completion) = Completion::channel();

        // Stored as soon as the result arrives, before the second call runs.
        let weak = Arc::downgrade(&self.inner);
        let rotate = self.inner.connection.apply(
            methods::GET_NEW_TOKEN,
            Vec::new(),
            ApplyOptions::wait().on_result_received(move |outcome| {
                let (Ok(value), Some(inner)) = (outcome, weak.upgrade()) else {
                    return;
                };
                match (TokenGrant::from_value(value.clone()), inner.connection.user_id()) {
                    (Ok(grant), Some(user_id)) => {
                        inner.store_session(&user_id, &grant.token, grant.token_expires);
                    }
                    (Ok(_), None) => warn!("rotated token arrived while logged out, not storing it"),
                    (Err(err), _) => warn!(error = %err, "malformed getNewToken result"),
                }
            }),
        );
        let revoke = self
            .inner
            .connection
            .apply(methods::REMOVE_OTHER_TOKENS, Vec::new(), ApplyOptions::wait());

        tokio::spawn(async move {
            let rotated = rotate.await;
            let revoked = revoke.await;
            let outcome = rotated.and(revoked).map(|_| ()).map_err(LoginError::from);
            let _ = tx.send(outcome);
        });
        completion
    }

    // -- Observing ----------------------------------------------------------

    /// Runs `listener` after every successful login.
    pub fn on_login(&self, listener: impl Fn() + Send + Sync + 'static) -> HookHandle {
        self.inner.on_login.register(move |_| listener())
    }

    /// Runs `listener` after every failed login.
    pub fn on_login_failure(&self, listener: impl Fn(&LoginError) + Send + Sync + 'static) -> HookHandle {
        self.inner.on_login_failure.register(listener)
    }

    /// Hands `callback` the outcome of the silent login made at start.
    ///
    /// Called immediately if the attempt is already recorded and no one
    /// has taken it yet.
    pub fn on_page_load_login(&self, callback: impl FnOnce(&LoginAttempt) + Send + 'static) {
        self.inner.page_load.register(Box::new(callback));
    }

    /// Whether the page-load attempt has been recorded.
    pub fn page_load_login_recorded(&self) -> bool {
        self.inner.page_load.is_recorded()
    }

    /// Whether a (non-suppressed) login is in flight.
    pub fn logging_in(&self) -> bool {
        *self.inner.logging_in.borrow()
    }

    /// Watches [`logging_in`](Self::logging_in). Notified only on change.
    pub fn subscribe_logging_in(&self) -> watch::Receiver<bool> {
        self.inner.logging_in.subscribe()
    }

    /// The user this connection is logged in as.
    pub fn user_id(&self) -> Option<UserId> {
        self.inner.connection.user_id()
    }

    /// The connection this manager logs in over.
    pub fn connection(&self) -> &C {
        &self.inner.connection
    }

    /// Applies runtime options. Each may be set once.
    ///
    /// # Errors
    /// [`ConfigError::AlreadySet`] if an option was set before; nothing
    /// changes in that case.
    pub fn configure(&self, options: AccountsOptions) -> Result<(), ConfigError> {
        lock(&self.inner.options).merge(options)
    }

    // -- Accounts links -----------------------------------------------------

    /// Handles a `#/reset-password/<token>` link. Only the last
    /// registration is used.
    pub fn on_reset_password_link(&self, callback: impl FnOnce(String, LinkDone) + Send + 'static) {
        self.register_link(LinkKind::ResetPassword, Box::new(callback));
    }

    /// Handles a `#/verify-email/<token>` link. Only the last registration
    /// is used.
    pub fn on_email_verification_link(&self, callback: impl FnOnce(String, LinkDone) + Send + 'static) {
        self.register_link(LinkKind::VerifyEmail, Box::new(callback));
    }

    /// Handles a `#/enroll-account/<token>` link. Only the last
    /// registration is used.
    pub fn on_enrollment_link(&self, callback: impl FnOnce(String, LinkDone) + Send + 'static) {
        self.register_link(LinkKind::EnrollAccount, Box::new(callback));
    }

    fn register_link(&self, kind: LinkKind, callback: LinkCallback) {
        if self.inner.state().link_callbacks.insert(kind, callback).is_some() {
            warn!(
                "{} was called more than once. Only one callback added will be executed.",
                kind.registration()
            );
        }
    }

    fn dispatch_pending_link(&self) {
        let (link, callback) = {
            let mut state = self.inner.state();
            let Some(link) = state.pending_link.take() else {
                return;
            };
            let callback = state.link_callbacks.remove(&link.kind);
            (link, callback)
        };
        match callback {
            Some(callback) => {
                debug!(kind = %link.kind, "handing accounts link to its callback");
                callback(link.token, LinkDone::new(self.clone()));
            }
            None => debug!(kind = %link.kind, "no callback for accounts link, auto-login stays off"),
        }
    }
}

impl<C, S> std::fmt::Debug for SessionTokenManager<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenManager")
            .field("keys", &*lock(&self.inner.keys))
            .field("logging_in", &*self.inner.logging_in.borrow())
            .finish_non_exhaustive()
    }
}

/// Passed to an accounts-link callback. Call [`done`](Self::done) when the
/// flow is finished to resume auto-login.
pub struct LinkDone {
    enable: Box<dyn FnOnce() + Send>,
}

impl LinkDone {
    fn new<C: Connection, S: KeyValueStore>(manager: SessionTokenManager<C, S>) -> Self {
        Self {
            enable: Box::new(move || {
                tokio::spawn(async move { manager.enable_auto_login().await });
            }),
        }
    }

    /// Re-enables auto-login and polls the stored token.
    pub fn done(self) {
        (self.enable)();
    }
}

impl std::fmt::Debug for LinkDone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkDone").finish_non_exhaustive()
    }
}
