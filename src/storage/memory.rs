//! In-process storage backend with failure injection.
//!
//! Serves two roles: the injectable backend for engine tests (simulated
//! quota and unavailable-store conditions), and a working backend for hosts
//! without a browser storage area.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{StorageBackend, StorageError};

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;

/// How the backend should misbehave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Operate normally.
    #[default]
    None,
    /// Reads and removes succeed, writes fail (quota-style).
    RejectWrites,
    /// Every operation fails (store inaccessible).
    Unavailable,
}

/// `HashMap`-backed storage with a switchable [`FailureMode`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
    mode: Cell<FailureMode>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the failure mode for subsequent operations.
    pub fn set_failure_mode(&self, mode: FailureMode) {
        self.mode.set(mode);
    }

    /// Direct look at a stored entry, bypassing the failure mode.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    /// Number of stored entries, bypassing the failure mode.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.mode.get() == FailureMode::Unavailable {
            return Err(StorageError::Unavailable);
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        match self.mode.get() {
            FailureMode::None => {
                self.entries.borrow_mut().insert(key.to_owned(), raw.to_owned());
                Ok(())
            }
            FailureMode::RejectWrites => Err(StorageError::WriteRejected("write rejected".to_owned())),
            FailureMode::Unavailable => Err(StorageError::Unavailable),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.mode.get() == FailureMode::Unavailable {
            return Err(StorageError::Unavailable);
        }
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
