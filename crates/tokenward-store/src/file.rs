//! File-backed store.
//!
//! The whole store is one document (a string → string map) encoded with a
//! [`Codec`]. Every operation re-reads the file, so a second process (a
//! second "tab") writing the same file is picked up on the next read.
//! Writes go to a uniquely named temp file first and are renamed into
//! place, so a reader never sees a half-written document.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::Rng;
use tokenward_protocol::{Codec, JsonCodec};

use crate::{KeyValueStore, StoreError};

type Document = BTreeMap<String, String>;

/// A [`KeyValueStore`] persisted to a single file.
pub struct FileStore<C: Codec = JsonCodec> {
    path: PathBuf,
    codec: C,
    /// Serializes read-modify-write cycles made through this handle.
    /// Other handles and other processes are not coordinated.
    write_lock: Mutex<()>,
}

impl FileStore<JsonCodec> {
    /// A JSON-encoded store at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_codec(path, JsonCodec)
    }
}

impl<C: Codec> FileStore<C> {
    /// A store at `path` using a custom codec.
    pub fn with_codec(path: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            path: path.into(),
            codec,
            write_lock: Mutex::new(()),
        }
    }

    /// Where the document lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Document, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Document::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }
        self.codec.decode(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, doc: &Document) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let bytes = self.codec.encode(doc).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let suffix: u32 = rand::rng().random();
        let tmp = self.path.with_extension(format!("tmp-{suffix:08x}"));
        fs::write(&tmp, bytes).map_err(io_err)?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(source));
        }
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut Document) -> bool) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut doc = self.load()?;
        if change(&mut doc) {
            self.save(&doc)?;
            tracing::trace!(path = %self.path.display(), entries = doc.len(), "store saved");
        }
        Ok(())
    }
}

impl<C: Codec> KeyValueStore for FileStore<C> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|doc| {
            let previous = doc.insert(key.to_string(), value.to_string());
            previous.as_deref() != Some(value)
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.update(|doc| doc.remove(key).is_some())
    }
}

impl<C: Codec + std::fmt::Debug> std::fmt::Debug for FileStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("codec", &self.codec)
            .finish()
    }
}
