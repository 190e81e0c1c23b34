//! Accounts links: `#/reset-password/<token>` and friends.
//!
//! Emails sent by the accounts server link back into the app with a
//! token in the URL fragment. While such a link is being handled,
//! auto-login is suspended, so resetting user A's password doesn't
//! happen while user B is logged in.

use std::fmt;

/// The kinds of accounts link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// `#/reset-password/<token>`
    ResetPassword,
    /// `#/verify-email/<token>`
    VerifyEmail,
    /// `#/enroll-account/<token>`
    EnrollAccount,
}

impl LinkKind {
    /// Every kind, in matching order.
    pub const ALL: [LinkKind; 3] = [Self::ResetPassword, Self::VerifyEmail, Self::EnrollAccount];

    /// The fragment path segment.
    pub fn path(self) -> &'static str {
        match self {
            Self::ResetPassword => "reset-password",
            Self::VerifyEmail => "verify-email",
            Self::EnrollAccount => "enroll-account",
        }
    }

    /// Name of the registration method, for diagnostics.
    pub(crate) fn registration(self) -> &'static str {
        match self {
            Self::ResetPassword => "on_reset_password_link",
            Self::VerifyEmail => "on_email_verification_link",
            Self::EnrollAccount => "on_enrollment_link",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A matched accounts link.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountsLink {
    /// Which flow the link starts.
    pub kind: LinkKind,
    /// The token after the path segment (may be empty).
    pub token: String,
}

impl fmt::Debug for AccountsLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountsLink")
            .field("kind", &self.kind)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Matches a URL fragment against the accounts link paths.
///
/// The fragment must be exactly `#/<path>/<token>`; everything after the
/// second slash is the token.
pub fn parse_fragment(fragment: &str) -> Option<AccountsLink> {
    let rest = fragment.strip_prefix("#/")?;
    LinkKind::ALL.into_iter().find_map(|kind| {
        let token = rest.strip_prefix(kind.path())?.strip_prefix('/')?;
        Some(AccountsLink {
            kind,
            token: token.to_string(),
        })
    })
}
