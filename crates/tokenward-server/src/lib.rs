//! Server side of Tokenward's login methods.
//!
//! The session manager on the client only works against a server that
//! answers `login`, `logout`, `getNewToken` and `removeOtherTokens`. This
//! crate is that server:
//!
//! 1. **Authentication**: checking a password ([`Authenticator`] trait,
//!    [`PasswordTable`] for tests and demos)
//! 2. **Token tracking**: which resume tokens are live, for whom, until
//!    when ([`TokenRegistry`])
//! 3. **Method handling**: the four login methods, per connection
//!    ([`AccountsService`])
//!
//! # How it fits in the stack
//!
//! ```text
//! SessionTokenManager (client)
//!     ↕  Connection::apply
//! LocalConnection (tokenward-rpc)
//!     ↕  MethodHandler::call
//! AccountsService (this crate) → TokenRegistry
//! ```

mod auth;
mod error;
mod registry;
mod service;

pub use auth::{Authenticator, PasswordTable};
pub use error::ServerError;
pub use registry::{IssuedToken, TokenRegistry};
pub use service::{AccountsService, EXPIRE_TOKENS_INTERVAL, ServiceConfig};
