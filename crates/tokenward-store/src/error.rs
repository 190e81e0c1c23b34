use std::path::PathBuf;

use tokenward_protocol::ProtocolError;

/// Errors that can occur while reading or writing a store.
///
/// The session manager treats every one of these as "value absent" and
/// logs it; they exist so callers using a store directly can tell a
/// missing key from a broken disk.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but isn't a valid store document.
    #[error("store document at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: ProtocolError,
    },

    /// The store's internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}
