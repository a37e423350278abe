//! Per-hook configuration.

use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::binding::DefaultValue;
use crate::serializer::{CodecError, JsonSerializer, ParseErrorHandler, Serializer};

#[cfg(test)]
#[path = "options_test.rs"]
mod options_test;

/// Options for one persisted-state hook. Built fluently:
///
/// ```ignore
/// let options = PersistedStateOptions::new()
///     .default_value(vec!["a".to_owned(), "b".to_owned()])
///     .storage_sync(false);
/// ```
pub struct PersistedStateOptions<T> {
    pub(crate) default_value: DefaultValue<T>,
    pub(crate) server_default_value: Option<T>,
    pub(crate) storage_sync: bool,
    pub(crate) serializer: Rc<dyn Serializer<T>>,
    pub(crate) on_parse_error: Option<ParseErrorHandler<T>>,
}

impl<T: Serialize + DeserializeOwned + 'static> Default for PersistedStateOptions<T> {
    fn default() -> Self {
        Self {
            default_value: DefaultValue::None,
            server_default_value: None,
            storage_sync: true,
            serializer: Rc::new(JsonSerializer),
            on_parse_error: None,
        }
    }
}

impl<T: Serialize + DeserializeOwned + 'static> PersistedStateOptions<T> {
    /// JSON serialization, cross-context sync on, no default value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T> PersistedStateOptions<T> {
    /// Value reads resolve to while the key has no stored entry. Seeded
    /// into the store on the first read that finds no entry. Fixed at first
    /// use; passing a different value on a later render has no effect.
    #[must_use]
    pub fn default_value(mut self, value: T) -> Self {
        self.default_value = DefaultValue::Value(value);
        self
    }

    /// Like [`Self::default_value`], but computed lazily at most once.
    #[must_use]
    pub fn default_value_fn(mut self, compute: impl Fn() -> T + 'static) -> Self {
        self.default_value = DefaultValue::Compute(Rc::new(compute));
        self
    }

    /// Value non-interactive (server) reads resolve to instead of the
    /// default, for markup that should render differently before a live
    /// context takes over.
    #[must_use]
    pub fn server_default_value(mut self, value: T) -> Self {
        self.server_default_value = Some(value);
        self
    }

    /// Whether changes made by other tabs, windows, and frames update this
    /// instance. On by default.
    #[must_use]
    pub fn storage_sync(mut self, enabled: bool) -> Self {
        self.storage_sync = enabled;
        self
    }

    /// Replace the JSON codec for this key.
    #[must_use]
    pub fn serializer(mut self, serializer: impl Serializer<T> + 'static) -> Self {
        self.serializer = Rc::new(serializer);
        self
    }

    /// Called when a stored string fails to parse, with the error and the
    /// corrupted raw string. Returning `Some` substitutes a recovery value
    /// for that read; returning `None` falls through to the default.
    #[must_use]
    pub fn on_parse_error(mut self, handler: impl Fn(&CodecError, &str) -> Option<T> + 'static) -> Self {
        self.on_parse_error = Some(Rc::new(handler));
        self
    }
}

impl<T: Clone> Clone for PersistedStateOptions<T> {
    fn clone(&self) -> Self {
        Self {
            default_value: self.default_value.clone(),
            server_default_value: self.server_default_value.clone(),
            storage_sync: self.storage_sync,
            serializer: Rc::clone(&self.serializer),
            on_parse_error: self.on_parse_error.clone(),
        }
    }
}
