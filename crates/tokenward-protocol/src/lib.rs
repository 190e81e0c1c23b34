//! Wire protocol for Tokenward.
//!
//! This crate defines what a client and an accounts server say to each
//! other when logging in, and the small amount of policy both sides share:
//!
//! - **Types** ([`LoginRequest`], [`LoginResult`], [`TokenGrant`],
//!   [`RemoteError`], etc.): the parameters and results of the login
//!   methods (`login`, `logout`, `getNewToken`, `removeOtherTokens`).
//! - **Lifetimes** ([`TokenLifetime`]): how long a resume token lives and
//!   when it counts as "expiring soon". Both the client and the server
//!   implement this capability.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how persisted documents
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! ```text
//! Client (session manager) → Protocol (LoginRequest / LoginResult) → RPC connection
//! ```
//!
//! The protocol layer knows nothing about connections or storage.

mod codec;
mod error;
mod lifetime;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use lifetime::{
    DEFAULT_LOGIN_EXPIRATION_DAYS, LoginExpiration, MIN_TOKEN_LIFETIME_CAP_SECS,
    TokenLifetime, expiration_at, expires_soon_at,
};
pub use types::{
    ErrorCode, LOGIN_CANCELLED_CODE, LoginRequest, LoginResult, RemoteError,
    ResumeToken, TokenGrant, UserId, UserSelector, methods,
};
