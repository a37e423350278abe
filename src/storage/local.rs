//! `localStorage` adapter for browser builds.
//!
//! Acquisition mirrors the usual web-sys dance: `window().local_storage()`
//! returns `Err` when storage access itself throws (privacy mode, sandboxed
//! frames) and `Ok(None)` when the API is missing. Both collapse to "no
//! backend here" and the caller decides how to degrade.

use wasm_bindgen::JsValue;

use super::{StorageBackend, StorageError};

/// Handle on the window's `localStorage` area.
#[derive(Clone)]
pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    /// Try to acquire `localStorage` for the current window. Returns `None`
    /// when there is no window or the store cannot be accessed.
    #[must_use]
    pub fn obtain() -> Option<Self> {
        let storage = web_sys::window()?.local_storage().ok().flatten()?;
        Some(Self { storage })
    }

    /// The underlying storage area, used for event identity checks.
    #[must_use]
    pub(crate) fn area(&self) -> &web_sys::Storage {
        &self.storage
    }
}

impl StorageBackend for LocalStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(|_| StorageError::Unavailable)
    }

    fn write(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        self.storage
            .set_item(key, raw)
            .map_err(|err| StorageError::WriteRejected(describe_js_error(&err)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key).map_err(|_| StorageError::Unavailable)
    }
}

fn describe_js_error(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| "storage operation failed".to_owned())
}
