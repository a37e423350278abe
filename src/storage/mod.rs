//! Durable key-value storage behind a narrow adapter trait.
//!
//! ERROR HANDLING
//! ==============
//! A failing backend is a signal, not an exception: every operation returns
//! `Result` and the state binding translates failures into in-memory
//! fallback mode. Nothing in this module panics or lets a platform error
//! escape the hook surface.

#[cfg(feature = "hydrate")]
mod local;
mod memory;

#[cfg(feature = "hydrate")]
pub use local::LocalStorage;
pub use memory::{FailureMode, MemoryStorage};

/// Error raised by a [`StorageBackend`] operation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store cannot be reached at all in this execution context
    /// (disabled, blocked, or access itself throws).
    #[error("durable storage is unavailable in this context")]
    Unavailable,
    /// The store rejected a write (quota exceeded or equivalent).
    #[error("durable storage rejected the write: {0}")]
    WriteRejected(String),
}

/// Adapter over a persistent key-value store.
///
/// All operations are synchronous. Implementations must report failure via
/// [`StorageError`] rather than panicking.
pub trait StorageBackend {
    /// Read the raw string for `key`; `Ok(None)` means no entry.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Write the raw string for `key`.
    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError>;
    /// Delete the entry for `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Backend for contexts where the durable store throws on access. Every
/// operation fails with [`StorageError::Unavailable`], which keeps such a
/// context on the in-memory fallback path for every key.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableStorage;

impl StorageBackend for UnavailableStorage {
    fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn write(&self, _key: &str, _raw: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}
