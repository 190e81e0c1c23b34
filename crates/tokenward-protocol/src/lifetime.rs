//! Resume-token lifetimes, shared by the client and the server.
//!
//! Both sides need to agree on how long a token lives: the server stamps
//! `tokenExpires` on every token it issues, and the client refuses to
//! resume with a token that is about to expire (so the user isn't
//! abruptly logged out seconds after the page loads).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long (in days) until a login token expires, unless configured.
pub const DEFAULT_LOGIN_EXPIRATION_DAYS: u32 = 90;

/// Upper bound on the "expires soon" safety margin: one hour.
///
/// The margin is 10% of the lifetime, so a 90-day token would otherwise
/// be discarded nine days before it expires.
pub const MIN_TOKEN_LIFETIME_CAP_SECS: i64 = 3600;

/// The capability of knowing the token lifetime.
///
/// Implementors only supply [`login_expiration_days`]; every derived
/// quantity has a default implementation so the client and server cannot
/// drift apart.
///
/// [`login_expiration_days`]: TokenLifetime::login_expiration_days
pub trait TokenLifetime {
    /// The configured lifetime in days. `None` or `Some(0)` means "use
    /// [`DEFAULT_LOGIN_EXPIRATION_DAYS`]".
    fn login_expiration_days(&self) -> Option<u32>;

    /// The token lifetime as a duration.
    fn token_lifetime(&self) -> Duration {
        let days = match self.login_expiration_days() {
            Some(days) if days > 0 => days,
            _ => DEFAULT_LOGIN_EXPIRATION_DAYS,
        };
        Duration::days(i64::from(days))
    }

    /// When a token issued at `when` expires.
    fn token_expiration(&self, when: DateTime<Utc>) -> DateTime<Utc> {
        expiration_at(self.token_lifetime(), when)
    }

    /// Whether a token expiring at `when` is too close to expiry to use.
    fn token_expires_soon(&self, when: DateTime<Utc>) -> bool {
        expires_soon_at(self.token_lifetime(), when, Utc::now())
    }
}

/// `issued + lifetime`, saturating at the largest representable instant.
pub fn expiration_at(lifetime: Duration, issued: DateTime<Utc>) -> DateTime<Utc> {
    issued
        .checked_add_signed(lifetime)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Pure form of [`TokenLifetime::token_expires_soon`] with an explicit
/// clock, for callers (and tests) that already hold `now`.
pub fn expires_soon_at(lifetime: Duration, expires: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let cap = Duration::seconds(MIN_TOKEN_LIFETIME_CAP_SECS);
    let margin = (lifetime / 10).min(cap);
    let threshold = expires
        .checked_sub_signed(margin)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    now > threshold
}

/// A plain, serializable [`TokenLifetime`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginExpiration {
    /// Days until an issued token expires. `None` = default (90).
    pub days: Option<u32>,
}

impl LoginExpiration {
    /// A lifetime of exactly `days` days.
    pub fn days(days: u32) -> Self {
        Self { days: Some(days) }
    }
}

impl TokenLifetime for LoginExpiration {
    fn login_expiration_days(&self) -> Option<u32> {
        self.days
    }
}
