//! Subscription registry: change fan-out and mount tracking per key.
//!
//! DESIGN
//! ======
//! One registry per execution context. Mounted hook instances register a
//! notify callback under their key; the write path and the cross-context
//! bridge call [`SubscriptionRegistry::notify`] and every registered
//! callback for that key runs synchronously. Callbacks are snapshotted out
//! of the borrow before they run, so a callback may subscribe or
//! unsubscribe without re-entering the map. Subscriptions are added on
//! mount and must be removed on unmount; a torn-down instance must never be
//! notified again.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

thread_local! {
    static PROCESS: Rc<SubscriptionRegistry> = Rc::new(SubscriptionRegistry::new());
}

/// Where a change notification originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A write or remove made by a hook instance in this context.
    Local,
    /// A storage event from another tab, window, or frame.
    External,
}

/// How a hook instance claims its key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountMode {
    /// Sole owner of the key; a second mount is a programming error.
    Exclusive,
    /// One of several call sites created through the shared-hook factory.
    Shared,
}

/// Two independent instances mounted the same key without going through the
/// shared-hook factory.
#[derive(Debug, thiserror::Error)]
#[error(
    "state key {key:?} is already mounted; call create_persisted_state once and \
     use_state() from every component that shares the key"
)]
pub struct DuplicateKeyError {
    pub key: String,
}

struct Subscriber {
    id: u64,
    sync_external: bool,
    notify: Rc<dyn Fn()>,
}

#[derive(Default)]
struct MountRecord {
    exclusive: bool,
    count: usize,
}

/// Per-context registry of subscribers and mounted keys.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscribers: RefCell<HashMap<String, Vec<Subscriber>>>,
    mounts: RefCell<HashMap<String, MountRecord>>,
    next_id: Cell<u64>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The context-wide instance shared by every hook in this context.
    #[must_use]
    pub fn process() -> Rc<Self> {
        PROCESS.with(Rc::clone)
    }

    // =========================================================
    // Subscriptions
    // =========================================================

    /// Register `notify` for changes to `key`. Subscribers with
    /// `sync_external` set to `false` are skipped for cross-context
    /// notifications. Returns the id used to unsubscribe.
    pub fn subscribe(&self, key: &str, sync_external: bool, notify: Rc<dyn Fn()>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers
            .borrow_mut()
            .entry(key.to_owned())
            .or_default()
            .push(Subscriber { id, sync_external, notify });
        id
    }

    /// Remove a subscription. Must run synchronously on unmount.
    pub fn unsubscribe(&self, key: &str, id: u64) {
        let mut subscribers = self.subscribers.borrow_mut();
        if let Some(list) = subscribers.get_mut(key) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(key);
            }
        }
    }

    /// Invoke every callback registered for `key`. State for the key must be
    /// fully written before calling this, so subscribers observe the new
    /// value when they re-read.
    pub fn notify(&self, key: &str, origin: ChangeOrigin) {
        let snapshot: Vec<Rc<dyn Fn()>> = self
            .subscribers
            .borrow()
            .get(key)
            .map(|list| {
                list.iter()
                    .filter(|s| origin == ChangeOrigin::Local || s.sync_external)
                    .map(|s| Rc::clone(&s.notify))
                    .collect()
            })
            .unwrap_or_default();
        for notify in snapshot {
            notify();
        }
    }

    /// Invoke callbacks for every subscribed key. Serves whole-store clears,
    /// which arrive without a key.
    pub fn notify_all(&self, origin: ChangeOrigin) {
        let keys: Vec<String> = self.subscribers.borrow().keys().cloned().collect();
        for key in keys {
            self.notify(&key, origin);
        }
    }

    /// Number of live subscriptions for `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.subscribers.borrow().get(key).map_or(0, Vec::len)
    }

    // =========================================================
    // Mount tracking
    // =========================================================

    /// Claim `key` for a mounting instance. An [`MountMode::Exclusive`]
    /// claim conflicts with any other live claim on the same key.
    pub fn register_mount(&self, key: &str, mode: MountMode) -> Result<(), DuplicateKeyError> {
        let mut mounts = self.mounts.borrow_mut();
        match mounts.get_mut(key) {
            Some(record) => {
                if record.exclusive || mode == MountMode::Exclusive {
                    return Err(DuplicateKeyError { key: key.to_owned() });
                }
                record.count += 1;
                Ok(())
            }
            None => {
                mounts.insert(
                    key.to_owned(),
                    MountRecord { exclusive: mode == MountMode::Exclusive, count: 1 },
                );
                Ok(())
            }
        }
    }

    /// Release one claim on `key`. Must run synchronously on unmount.
    pub fn release_mount(&self, key: &str) {
        let mut mounts = self.mounts.borrow_mut();
        if let Some(record) = mounts.get_mut(key) {
            record.count -= 1;
            if record.count == 0 {
                mounts.remove(key);
            }
        }
    }

    /// Whether any instance currently claims `key`.
    #[must_use]
    pub fn is_mounted(&self, key: &str) -> bool {
        self.mounts.borrow().contains_key(key)
    }
}
