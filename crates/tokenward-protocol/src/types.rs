//! Core protocol types: the parameters and results of the login methods.
//!
//! Every type here travels "on the wire" as JSON, so the serde attributes
//! are part of the contract: a mismatch means the other side can't parse
//! what we send.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ProtocolError;

/// Names of the remote methods the session manager calls.
pub mod methods {
    /// Log in. Parameter: a single [`LoginRequest`](crate::LoginRequest).
    pub const LOGIN: &str = "login";
    /// Log the calling connection out and revoke its token.
    pub const LOGOUT: &str = "logout";
    /// Issue a fresh token for the logged-in user (rotate).
    pub const GET_NEW_TOKEN: &str = "getNewToken";
    /// Revoke every token of the user except the connection's current one.
    pub const REMOVE_OTHER_TOKENS: &str = "removeOtherTokens";
}

/// Numeric code for a login the user cancelled (closed a popup, declined
/// a prompt). Stable because it crosses the wire as a plain number.
pub const LOGIN_CANCELLED_CODE: i64 = 0x8acd_c2f;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of an authenticated principal.
///
/// `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An opaque bearer credential accepted by the `login` method in place of
/// a password.
///
/// `Debug` and `Display` never print the value, so a token can be passed
/// to `tracing` fields without leaking into logs. Use [`as_str`] when the
/// value is genuinely needed (storage, the wire).
///
/// [`as_str`]: ResumeToken::as_str
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(String);

impl ResumeToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the raw token.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Token length (safe to log).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the token is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResumeToken([REDACTED; {}])", self.0.len())
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED TOKEN]")
    }
}

impl From<&str> for ResumeToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

// ---------------------------------------------------------------------------
// LoginRequest: the single parameter of `login`
// ---------------------------------------------------------------------------

/// How a password login names the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserSelector {
    /// `{ "username": "..." }`
    Username { username: String },
    /// `{ "email": "..." }`
    Email { email: String },
    /// `{ "id": "..." }`
    Id { id: UserId },
}

/// The argument object passed to the `login` method.
///
/// `#[serde(untagged)]` because the server tells the variants apart by
/// which fields are present, not by a tag:
///
/// ```text
/// { "resume": "<token>" }
/// { "user": { "username": "alice" }, "password": "..." }
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoginRequest {
    /// Resume a previous session with a stored token.
    Resume { resume: ResumeToken },
    /// Log in with a password.
    Password { user: UserSelector, password: String },
}

impl LoginRequest {
    /// A resume-token login.
    pub fn resume(token: ResumeToken) -> Self {
        Self::Resume { resume: token }
    }

    /// A username + password login.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            user: UserSelector::Username {
                username: username.into(),
            },
            password: password.into(),
        }
    }

    /// Encodes the request as the positional parameter list of `login`.
    pub fn to_params(&self) -> Vec<Value> {
        let arg = match self {
            Self::Resume { resume } => json!({ "resume": resume.as_str() }),
            Self::Password { user, password } => {
                let user = match user {
                    UserSelector::Username { username } => json!({ "username": username }),
                    UserSelector::Email { email } => json!({ "email": email }),
                    UserSelector::Id { id } => json!({ "id": id.as_str() }),
                };
                json!({ "user": user, "password": password })
            }
        };
        vec![arg]
    }

    /// Decodes the first positional parameter of a `login` call.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] if there is no parameter,
    /// [`ProtocolError::Decode`] if it has neither shape.
    pub fn from_params(params: &[Value]) -> Result<Self, ProtocolError> {
        let first = params
            .first()
            .ok_or_else(|| ProtocolError::InvalidMessage("login requires one argument".into()))?;
        serde_json::from_value(first.clone()).map_err(ProtocolError::Decode)
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume { resume } => f.debug_struct("Resume").field("resume", resume).finish(),
            Self::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What a successful login method returns.
///
/// `tokenExpires` is optional on the wire; when absent the client
/// computes "now + lifetime" itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResult {
    /// The user now logged in on this connection.
    pub id: UserId,
    /// A resume token for later silent logins.
    pub token: ResumeToken,
    /// When `token` expires.
    #[serde(
        rename = "tokenExpires",
        default,
        with = "wire_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub token_expires: Option<DateTime<Utc>>,
}

impl LoginResult {
    /// Decodes a raw method result.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] for the wrong shape,
    /// [`ProtocolError::InvalidMessage`] for an empty token.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let result: Self = serde_json::from_value(value).map_err(ProtocolError::Decode)?;
        if result.token.is_empty() {
            return Err(ProtocolError::InvalidMessage("login result has an empty token".into()));
        }
        Ok(result)
    }

    /// Encodes the result for the wire.
    pub fn to_value(&self) -> Value {
        let mut value = json!({ "id": self.id.as_str(), "token": self.token.as_str() });
        if let Some(expires) = self.token_expires {
            value["tokenExpires"] = wire_date::to_value(expires);
        }
        value
    }
}

/// What `getNewToken` returns: a rotated token for the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// The new resume token.
    pub token: ResumeToken,
    /// When the new token expires.
    #[serde(
        rename = "tokenExpires",
        default,
        with = "wire_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub token_expires: Option<DateTime<Utc>>,
}

impl TokenGrant {
    /// Decodes a raw `getNewToken` result.
    ///
    /// # Errors
    /// Same as [`LoginResult::from_value`].
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let grant: Self = serde_json::from_value(value).map_err(ProtocolError::Decode)?;
        if grant.token.is_empty() {
            return Err(ProtocolError::InvalidMessage("token grant has an empty token".into()));
        }
        Ok(grant)
    }
}

/// Dates on the wire.
///
/// We always send EJSON (`{"$date": <epoch millis>}`), but accept plain
/// epoch milliseconds and RFC 3339 strings too, since hand-written
/// servers tend to emit one of those.
mod wire_date {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::{Value, json};

    #[derive(Serialize)]
    struct Ejson {
        #[serde(rename = "$date")]
        date: i64,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AnyDate {
        Ejson {
            #[serde(rename = "$date")]
            date: i64,
        },
        Millis(i64),
        Text(String),
    }

    pub(super) fn to_value(when: DateTime<Utc>) -> Value {
        json!({ "$date": when.timestamp_millis() })
    }

    pub(super) fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(|when| Ejson {
                date: when.timestamp_millis(),
            })
            .serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<AnyDate>::deserialize(deserializer)? {
            None => Ok(None),
            Some(AnyDate::Ejson { date }) | Some(AnyDate::Millis(date)) => {
                DateTime::from_timestamp_millis(date)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom("timestamp out of range"))
            }
            Some(AnyDate::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|when| Some(when.with_timezone(&Utc)))
                .map_err(D::Error::custom),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteError: a method that failed on the server
// ---------------------------------------------------------------------------

/// An error code: HTTP-style numbers (400, 403, 404) or a symbolic string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(code) => write!(f, "{code}"),
            Self::Text(code) => f.write_str(code),
        }
    }
}

/// An error returned by a remote method, as it appears on the wire:
///
/// ```text
/// { "error": 403, "reason": "You've been logged out by the server. Please log in again." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Machine-readable code.
    pub error: ErrorCode,
    /// Human-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Extra details, free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RemoteError {
    /// An error with a numeric code and a reason.
    pub fn new(code: i64, reason: impl Into<String>) -> Self {
        Self {
            error: ErrorCode::Number(code),
            reason: Some(reason.into()),
            details: None,
        }
    }

    /// 400: malformed method arguments.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::new(400, reason)
    }

    /// 403: credentials rejected.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::new(403, reason)
    }

    /// 404: no such method.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(404, format!("Method '{method}' not found"))
    }

    /// The user cancelled an interactive login.
    pub fn login_cancelled(description: impl Into<String>) -> Self {
        Self::new(LOGIN_CANCELLED_CODE, description)
    }

    /// Whether this is the login-cancelled error.
    pub fn is_login_cancelled(&self) -> bool {
        self.error == ErrorCode::Number(LOGIN_CANCELLED_CODE)
    }

    /// The numeric code, if the code is numeric.
    pub fn code(&self) -> Option<i64> {
        match self.error {
            ErrorCode::Number(code) => Some(code),
            ErrorCode::Text(_) => None,
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{reason} [{}]", self.error),
            None => write!(f, "[{}]", self.error),
        }
    }
}

impl std::error::Error for RemoteError {}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes below are what the accounts server expects and
    //! returns; they are checked literally.

    use super::*;

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::from("u1")).unwrap();
        assert_eq!(json, "\"u1\"");
    }

    #[test]
    fn test_resume_token_debug_is_redacted() {
        let token = ResumeToken::new("super-secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert_eq!(token.to_string(), "[REDACTED TOKEN]");
        assert_eq!(token.as_str(), "super-secret");
    }

    #[test]
    fn test_resume_request_params_shape() {
        let params = LoginRequest::resume(ResumeToken::new("tokA")).to_params();
        assert_eq!(params, vec![json!({ "resume": "tokA" })]);
    }

    #[test]
    fn test_password_request_params_shape() {
        let params = LoginRequest::password("alice", "pw").to_params();
        assert_eq!(
            params,
            vec![json!({ "user": { "username": "alice" }, "password": "pw" })]
        );
    }

    #[test]
    fn test_from_params_recognizes_both_shapes() {
        let resume = LoginRequest::from_params(&[json!({ "resume": "t" })]).unwrap();
        assert_eq!(resume, LoginRequest::resume(ResumeToken::new("t")));

        let password = LoginRequest::from_params(&[json!({
            "user": { "email": "a@example.com" },
            "password": "pw"
        })])
        .unwrap();
        assert!(matches!(
            password,
            LoginRequest::Password { user: UserSelector::Email { .. }, .. }
        ));
    }

    #[test]
    fn test_from_params_empty_is_invalid() {
        let err = LoginRequest::from_params(&[]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_password_request_debug_hides_password() {
        let debug = format!("{:?}", LoginRequest::password("alice", "hunter2"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_login_result_accepts_ejson_millis_and_rfc3339() {
        let expected = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let ejson = LoginResult::from_value(json!({
            "id": "u1", "token": "t", "tokenExpires": { "$date": 1_700_000_000_000i64 }
        }))
        .unwrap();
        assert_eq!(ejson.token_expires, Some(expected));

        let millis = LoginResult::from_value(json!({
            "id": "u1", "token": "t", "tokenExpires": 1_700_000_000_000i64
        }))
        .unwrap();
        assert_eq!(millis.token_expires, Some(expected));

        let text = LoginResult::from_value(json!({
            "id": "u1", "token": "t", "tokenExpires": "2023-11-14T22:13:20Z"
        }))
        .unwrap();
        assert_eq!(text.token_expires, Some(expected));
    }

    #[test]
    fn test_login_result_without_expiry() {
        let result = LoginResult::from_value(json!({ "id": "u1", "token": "t" })).unwrap();
        assert_eq!(result.token_expires, None);
        assert_eq!(result.id, UserId::from("u1"));
    }

    #[test]
    fn test_login_result_missing_token_is_decode_error() {
        let err = LoginResult::from_value(json!({ "id": "u1" })).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_login_result_empty_token_is_invalid() {
        let err = LoginResult::from_value(json!({ "id": "u1", "token": "" })).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_login_result_to_value_emits_ejson_date() {
        let result = LoginResult {
            id: UserId::from("u1"),
            token: ResumeToken::new("t"),
            token_expires: DateTime::from_timestamp_millis(5_000),
        };
        assert_eq!(
            result.to_value(),
            json!({ "id": "u1", "token": "t", "tokenExpires": { "$date": 5_000 } })
        );
        // Serde's derive path agrees with the hand-built value.
        assert_eq!(serde_json::to_value(&result).unwrap(), result.to_value());
    }

    #[test]
    fn test_token_grant_decodes() {
        let grant = TokenGrant::from_value(json!({ "token": "new" })).unwrap();
        assert_eq!(grant.token.as_str(), "new");
    }

    #[test]
    fn test_remote_error_wire_shape() {
        let err = RemoteError::forbidden("nope");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "error": 403, "reason": "nope" })
        );
        assert_eq!(err.to_string(), "nope [403]");
    }

    #[test]
    fn test_remote_error_string_code_decodes() {
        let err: RemoteError =
            serde_json::from_value(json!({ "error": "too-many-requests" })).unwrap();
        assert_eq!(err.error, ErrorCode::Text("too-many-requests".into()));
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "[too-many-requests]");
    }

    #[test]
    fn test_login_cancelled_code_is_stable() {
        let err = RemoteError::login_cancelled("popup closed");
        assert!(err.is_login_cancelled());
        assert_eq!(err.code(), Some(145_546_287));
        assert_eq!(serde_json::to_value(&err).unwrap()["error"], json!(145_546_287));
    }

    #[test]
    fn test_method_not_found_reason() {
        let err = RemoteError::method_not_found("frobnicate");
        assert_eq!(err.code(), Some(404));
        assert_eq!(err.reason.as_deref(), Some("Method 'frobnicate' not found"));
    }
}
