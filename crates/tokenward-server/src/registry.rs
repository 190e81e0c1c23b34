//! The token registry: every resume token the server has issued.
//!
//! Tokens are kept in two maps held in sync: by token (for `resume`) and
//! by user (for "log out my other devices"). Like the rest of the
//! server-side state it is not thread-safe by itself; the
//! [`AccountsService`](crate::AccountsService) owns it behind a mutex.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokenward_protocol::{LoginResult, ResumeToken, TokenLifetime, UserId, expiration_at};

use crate::ServerError;

/// One issued resume token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Who the token logs in as.
    pub user_id: UserId,
    /// The token itself.
    pub token: ResumeToken,
    /// When it was issued.
    pub when: DateTime<Utc>,
    /// When it stops being accepted.
    pub expires: DateTime<Utc>,
}

impl IssuedToken {
    /// The `login` result handing this token to a client.
    pub fn to_login_result(&self) -> LoginResult {
        LoginResult {
            id: self.user_id.clone(),
            token: self.token.clone(),
            token_expires: Some(self.expires),
        }
    }
}

/// All live resume tokens.
///
/// ## Lifecycle
///
/// ```text
/// issue() ──→ [live] ──→ resume() ... resume()
///                │
///                ├──→ revoke() / revoke_all_except()   (logout)
///                └──→ expire_stale()                    (sweep, after `expires`)
/// ```
#[derive(Debug)]
pub struct TokenRegistry {
    /// Issued tokens, keyed by the token string.
    tokens: HashMap<String, IssuedToken>,
    /// Index from user to their token strings. Kept in sync with `tokens`.
    by_user: HashMap<UserId, HashSet<String>>,
    lifetime: Duration,
}

impl TokenRegistry {
    /// An empty registry issuing tokens that live for `lifetime`.
    pub fn new(lifetime: &impl TokenLifetime) -> Self {
        Self {
            tokens: HashMap::new(),
            by_user: HashMap::new(),
            lifetime: lifetime.token_lifetime(),
        }
    }

    /// Issues a fresh token for `user_id`.
    pub fn issue(&mut self, user_id: UserId) -> IssuedToken {
        self.issue_at(user_id, Utc::now())
    }

    /// [`issue`](Self::issue) with an explicit clock.
    pub fn issue_at(&mut self, user_id: UserId, now: DateTime<Utc>) -> IssuedToken {
        let issued = IssuedToken {
            user_id: user_id.clone(),
            token: ResumeToken::new(generate_token()),
            when: now,
            expires: expiration_at(self.lifetime, now),
        };
        let key = issued.token.as_str().to_string();
        self.by_user.entry(user_id.clone()).or_default().insert(key.clone());
        self.tokens.insert(key, issued.clone());

        tracing::info!(%user_id, "resume token issued");
        issued
    }

    /// Looks up a token presented in a resume login.
    ///
    /// # Errors
    /// - [`ServerError::TokenNotFound`]: never issued, or revoked
    /// - [`ServerError::TokenExpired`]: past its expiry; it is removed
    pub fn resume(&mut self, token: &str) -> Result<IssuedToken, ServerError> {
        self.resume_at(token, Utc::now())
    }

    /// [`resume`](Self::resume) with an explicit clock.
    pub fn resume_at(&mut self, token: &str, now: DateTime<Utc>) -> Result<IssuedToken, ServerError> {
        let issued = self.tokens.get(token).ok_or(ServerError::TokenNotFound)?;
        if now >= issued.expires {
            let user_id = issued.user_id.clone();
            self.revoke(token);
            return Err(ServerError::TokenExpired(user_id));
        }
        Ok(issued.clone())
    }

    /// Removes one token. Returns whether it existed.
    pub fn revoke(&mut self, token: &str) -> bool {
        let Some(issued) = self.tokens.remove(token) else {
            return false;
        };
        if let Some(set) = self.by_user.get_mut(&issued.user_id) {
            set.remove(token);
            if set.is_empty() {
                self.by_user.remove(&issued.user_id);
            }
        }
        true
    }

    /// Removes every token of `user_id` except `keep`. Returns the
    /// removed token strings.
    pub fn revoke_all_except(&mut self, user_id: &UserId, keep: &str) -> Vec<String> {
        let doomed: Vec<String> = self
            .by_user
            .get(user_id)
            .map(|set| set.iter().filter(|t| t.as_str() != keep).cloned().collect())
            .unwrap_or_default();
        for token in &doomed {
            self.revoke(token);
        }
        if !doomed.is_empty() {
            tracing::info!(%user_id, removed = doomed.len(), "revoked other tokens");
        }
        doomed
    }

    /// Removes every token past its expiry. Returns the removed token
    /// strings.
    pub fn expire_stale(&mut self) -> Vec<String> {
        self.expire_stale_at(Utc::now())
    }

    /// [`expire_stale`](Self::expire_stale) with an explicit clock.
    pub fn expire_stale_at(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .tokens
            .iter()
            .filter(|(_, issued)| now >= issued.expires)
            .map(|(token, _)| token.clone())
            .collect();
        for token in &expired {
            self.revoke(token);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired stale resume tokens");
        }
        expired
    }

    /// Number of live tokens held by `user_id`.
    pub fn tokens_for(&self, user_id: &UserId) -> usize {
        self.by_user.get(user_id).map_or(0, HashSet::len)
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are live.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Generates a random 64-character hex token (256 bits of entropy).
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
