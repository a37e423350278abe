//! Process-wide in-memory fallback for keys the durable store rejected.
//!
//! DESIGN
//! ======
//! One map per execution context, key to raw serialized string. An entry
//! exists exactly while its key is in fallback mode: the write path inserts
//! in lockstep with the durable attempt and deletes again once a durable
//! write succeeds, so `contains` doubles as the persistence flag. Entries
//! live until an explicit remove or a successful durable write; nothing
//! expires them. Raw strings rather than values keep the map homogeneous
//! across keys of different state types.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[cfg(test)]
#[path = "fallback_test.rs"]
mod fallback_test;

thread_local! {
    static PROCESS: Rc<FallbackMap> = Rc::new(FallbackMap::new());
}

/// Map from key to the raw string of its latest non-durable write.
#[derive(Debug, Default)]
pub struct FallbackMap {
    entries: RefCell<HashMap<String, String>>,
}

impl FallbackMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The context-wide instance shared by every hook in this context.
    #[must_use]
    pub fn process() -> Rc<Self> {
        PROCESS.with(Rc::clone)
    }

    /// Hold `raw` for `key` until a durable write succeeds.
    pub fn set(&self, key: &str, raw: &str) {
        self.entries.borrow_mut().insert(key.to_owned(), raw.to_owned());
    }

    /// The held raw string for `key`, which takes priority over the durable
    /// store's value while present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    /// Whether `key` is currently in fallback mode.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Drop the entry for `key`, returning it to durable-backed reads.
    pub fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
