//! Password checks.
//!
//! Tokenward doesn't store credentials itself. The [`Authenticator`]
//! trait is the hook: one async method that takes the user selector and
//! password from a `login` call and returns the user's id or an error.
//! [`PasswordTable`] is an in-memory implementation for tests and demos.

use std::collections::HashMap;

use tokenward_protocol::{UserId, UserSelector};

use crate::ServerError;

/// Validates a password login and returns the user's identity.
///
/// # Example
///
/// ```rust
/// use tokenward_protocol::{UserId, UserSelector};
/// use tokenward_server::{Authenticator, ServerError};
///
/// /// Lets everyone in as themselves. Development only.
/// struct TrustEveryone;
///
/// impl Authenticator for TrustEveryone {
///     async fn authenticate(
///         &self,
///         user: &UserSelector,
///         _password: &str,
///     ) -> Result<UserId, ServerError> {
///         match user {
///             UserSelector::Username { username } => Ok(UserId::from(username.as_str())),
///             _ => Err(ServerError::AuthFailed("User not found".into())),
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks `password` for the user named by `user`.
    ///
    /// # Returns
    /// - `Ok(UserId)`: the password is right
    /// - `Err(ServerError::AuthFailed)`: unknown user or wrong password
    fn authenticate(
        &self,
        user: &UserSelector,
        password: &str,
    ) -> impl std::future::Future<Output = Result<UserId, ServerError>> + Send;
}

#[derive(Debug, Clone)]
struct Account {
    id: UserId,
    email: Option<String>,
    password: String,
}

/// In-memory username → password table.
///
/// Passwords are compared as plain text, so this is only for tests and
/// demos.
#[derive(Debug, Clone, Default)]
pub struct PasswordTable {
    accounts: HashMap<String, Account>,
}

impl PasswordTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a user.
    pub fn with_user(
        mut self,
        username: impl Into<String>,
        id: impl Into<UserId>,
        password: impl Into<String>,
    ) -> Self {
        self.accounts.insert(
            username.into(),
            Account {
                id: id.into(),
                email: None,
                password: password.into(),
            },
        );
        self
    }

    /// Sets the email address of an existing user, so it can log in by
    /// email. Unknown usernames are ignored.
    pub fn with_email(mut self, username: &str, email: impl Into<String>) -> Self {
        if let Some(account) = self.accounts.get_mut(username) {
            account.email = Some(email.into());
        }
        self
    }

    fn find(&self, user: &UserSelector) -> Option<&Account> {
        match user {
            UserSelector::Username { username } => self.accounts.get(username),
            UserSelector::Email { email } => self
                .accounts
                .values()
                .find(|a| a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))),
            UserSelector::Id { id } => self.accounts.values().find(|a| &a.id == id),
        }
    }
}

impl Authenticator for PasswordTable {
    async fn authenticate(&self, user: &UserSelector, password: &str) -> Result<UserId, ServerError> {
        let account = self
            .find(user)
            .ok_or_else(|| ServerError::AuthFailed("User not found".into()))?;
        if account.password != password {
            return Err(ServerError::AuthFailed("Incorrect password".into()));
        }
        Ok(account.id.clone())
    }
}
