//! Durable key/value storage for Tokenward session records.
//!
//! The session manager persists three string values per endpoint (user id,
//! resume token, token expiry) through the [`KeyValueStore`] trait, the
//! same `getItem` / `setItem` / `removeItem` contract a browser's local
//! storage offers.
//!
//! Two implementations ship here:
//!
//! - [`MemoryStore`]: a shared in-process map. Clones share state, so two
//!   managers holding clones behave like two tabs of the same origin.
//! - [`FileStore`]: a whole-map document on disk, re-read on every
//!   access so separate processes observe each other's writes.
//!
//! Neither takes a cross-process lock. Writers race and the last write
//! wins; the session manager's poll loop is what converges the tabs.

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;

/// A string-keyed, string-valued durable store.
///
/// `Send + Sync + 'static` because the session manager shares its store
/// with its poll task and reconnect hook.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads a value. `Ok(None)` when the key is absent.
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes a value. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore> KeyValueStore for std::sync::Arc<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove_item(key)
    }
}
