//! Pluggable string codec for stored values.
//!
//! The engine never assumes a wire shape beyond "one string per key". The
//! default [`JsonSerializer`] covers the common case over `serde_json`; a
//! custom [`Serializer`] can be injected per hook instance for anything else.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::rc::Rc;

#[cfg(test)]
#[path = "serializer_test.rs"]
mod serializer_test;

/// Raw string some producers store when they have no encoding for an absent
/// value. JSON itself cannot represent it, so [`JsonSerializer`] reads it as
/// `null`.
const UNDEFINED_RAW: &str = "undefined";

/// Error returned by [`Serializer`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be turned into a storable string.
    #[error("failed to serialize value: {0}")]
    Stringify(#[source] serde_json::Error),
    /// The stored string could not be turned back into a value.
    #[error("failed to parse stored value: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Handler invoked when a stored string fails to parse. Receives the error
/// and the corrupted raw string; may return a recovery value to use for that
/// read instead of the default.
pub type ParseErrorHandler<T> = Rc<dyn Fn(&CodecError, &str) -> Option<T>>;

/// Converts values to and from their stored string form.
pub trait Serializer<T> {
    /// Encode `value` as the string written to storage.
    fn stringify(&self, value: &T) -> Result<String, CodecError>;
    /// Decode a string previously written to storage.
    fn parse(&self, raw: &str) -> Result<T, CodecError>;
}

/// Default codec: plain JSON via `serde_json`.
///
/// One special case on the read side: the literal raw string `undefined` is
/// decoded as JSON `null`, so an `Option<T>` slot written by a producer with
/// no representation for "no value" round-trips to `None` instead of failing
/// to parse.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl<T: Serialize + DeserializeOwned> Serializer<T> for JsonSerializer {
    fn stringify(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(CodecError::Stringify)
    }

    fn parse(&self, raw: &str) -> Result<T, CodecError> {
        if raw == UNDEFINED_RAW {
            return serde_json::from_value(serde_json::Value::Null).map_err(CodecError::Parse);
        }
        serde_json::from_str(raw).map_err(CodecError::Parse)
    }
}
