//! Per-instance state binding: the read, write, and remove paths.
//!
//! DESIGN
//! ======
//! A `StateBinding` composes the execution context, the serializer, and a
//! snapshot cache into the engine behind one hook instance. The write path
//! settles all state (fallback entry, durable entry) before notifying the
//! registry, so subscribers re-reading inside the notification observe the
//! new value. The read path resolves in priority order: non-interactive or
//! pre-attach reads yield the default, a fallback entry beats the durable
//! raw, and an absent entry yields the default after at most one attempt to
//! seed an explicit default into the store.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here throws past the hook surface. Storage failures flip the key
//! into fallback mode, corrupt stored values resolve to a recovery value or
//! the default, and serializer failures turn the write into a logged no-op.

use std::cell::{Cell, OnceCell};
use std::rc::Rc;

use crate::context::{ExecutionContext, InteractiveContext};
use crate::options::PersistedStateOptions;
use crate::registry::ChangeOrigin;
use crate::serializer::{ParseErrorHandler, Serializer};
use crate::snapshot::SnapshotCache;

#[cfg(test)]
#[path = "binding_test.rs"]
mod binding_test;

/// Initial value for a key with no stored entry.
pub enum DefaultValue<T> {
    /// No default configured: absent keys read as `T::default()` and
    /// nothing is ever written on mount.
    None,
    /// A fixed default, seeded into the store on the first read that finds
    /// no entry.
    Value(T),
    /// A lazily computed default, resolved at most once per instance and
    /// then fixed.
    Compute(Rc<dyn Fn() -> T>),
}

impl<T: Clone> Clone for DefaultValue<T> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Value(value) => Self::Value(value.clone()),
            Self::Compute(compute) => Self::Compute(Rc::clone(compute)),
        }
    }
}

/// What a setter call carries: a replacement value or a transform of the
/// current one. The transform runs against the authoritative current value
/// at write time, never a value captured earlier.
pub enum ValueUpdate<T> {
    Value(T),
    Transform(Box<dyn FnOnce(&T) -> T>),
}

/// Whether this instance has been attached to a live rendering pass.
///
/// Reads before the transition return the default so server-rendered and
/// hydrating output agree; the framework's post-commit effect performs the
/// single `PreAttach` to `Attached` transition and triggers at most one
/// corrective re-render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttachPhase {
    PreAttach,
    Attached,
}

/// The engine behind one mounted hook instance.
pub struct StateBinding<T> {
    key: String,
    context: ExecutionContext,
    serializer: Rc<dyn Serializer<T>>,
    default: DefaultValue<T>,
    resolved_default: OnceCell<T>,
    server_default: Option<T>,
    on_parse_error: Option<ParseErrorHandler<T>>,
    cache: SnapshotCache<T>,
    phase: Cell<AttachPhase>,
    seed_attempted: Cell<bool>,
}

impl<T: Clone + Default + 'static> StateBinding<T> {
    #[must_use]
    pub fn new(key: String, context: ExecutionContext, options: PersistedStateOptions<T>) -> Self {
        Self {
            key,
            context,
            serializer: options.serializer,
            default: options.default_value,
            resolved_default: OnceCell::new(),
            server_default: options.server_default_value,
            on_parse_error: options.on_parse_error,
            cache: SnapshotCache::new(),
            phase: Cell::new(AttachPhase::PreAttach),
            seed_attempted: Cell::new(false),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Transition to `Attached`. Returns `true` on the transition, `false`
    /// if already attached; the caller re-renders only on `true`.
    pub fn attach(&self) -> bool {
        if self.phase.get() == AttachPhase::Attached {
            return false;
        }
        self.phase.set(AttachPhase::Attached);
        true
    }

    // =========================================================
    // Read path
    // =========================================================

    /// The current value for this key.
    #[must_use]
    pub fn read(&self) -> T {
        let Some(cx) = self.context.interactive() else {
            return self.pre_attach_value();
        };
        if self.phase.get() == AttachPhase::PreAttach {
            return self.pre_attach_value();
        }

        let raw = self.effective_raw(cx);
        if let Some(value) = self.cache.lookup(raw.as_deref()) {
            return value;
        }
        let value = match &raw {
            Some(raw) => self.parse_with_recovery(raw),
            None => {
                self.maybe_seed_default(cx);
                self.default_value()
            }
        };
        self.cache.store(raw, value.clone());
        value
    }

    /// Whether the latest state of this key is held durably. `true` in
    /// non-interactive contexts; recomputed from fallback membership
    /// otherwise, so a later durable write flips it back.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        match self.context.interactive() {
            None => true,
            Some(cx) => !cx.fallback().contains(&self.key),
        }
    }

    fn pre_attach_value(&self) -> T {
        self.server_default.clone().unwrap_or_else(|| self.default_value())
    }

    fn default_value(&self) -> T {
        self.resolved_default
            .get_or_init(|| match &self.default {
                DefaultValue::None => T::default(),
                DefaultValue::Value(value) => value.clone(),
                DefaultValue::Compute(compute) => compute(),
            })
            .clone()
    }

    /// The raw string reads resolve against: a fallback entry wins over the
    /// durable store, and a failing durable read counts as no entry.
    fn effective_raw(&self, cx: &InteractiveContext) -> Option<String> {
        if let Some(raw) = cx.fallback().get(&self.key) {
            return Some(raw);
        }
        match cx.storage().read(&self.key) {
            Ok(raw) => raw,
            Err(err) => {
                log::debug!("durable read failed for key {:?}: {err}", self.key);
                None
            }
        }
    }

    fn parse_with_recovery(&self, raw: &str) -> T {
        match self.serializer.parse(raw) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("stored value for key {:?} is unreadable: {err}", self.key);
                if let Some(handler) = &self.on_parse_error {
                    if let Some(recovered) = handler(&err, raw) {
                        return recovered;
                    }
                }
                self.default_value()
            }
        }
    }

    /// Write an explicit default into the store the first time a read finds
    /// no entry. One attempt per instance; a rejected seed is not a reason
    /// to enter fallback mode and is not retried on later renders.
    fn maybe_seed_default(&self, cx: &InteractiveContext) {
        if self.seed_attempted.get() {
            return;
        }
        self.seed_attempted.set(true);
        if matches!(self.default, DefaultValue::None) {
            return;
        }
        let value = self.default_value();
        match self.serializer.stringify(&value) {
            Ok(raw) => {
                if let Err(err) = cx.storage().write(&self.key, &raw) {
                    log::debug!("could not seed default for key {:?}: {err}", self.key);
                }
            }
            Err(err) => log::warn!("could not serialize default for key {:?}: {err}", self.key),
        }
    }

    // =========================================================
    // Write path
    // =========================================================

    /// Apply a setter call: settle fallback and durable state, then notify
    /// every subscriber of this key.
    pub fn apply(&self, update: ValueUpdate<T>) {
        let Some(cx) = self.context.interactive() else {
            return;
        };
        let value = match update {
            ValueUpdate::Value(value) => value,
            ValueUpdate::Transform(transform) => transform(&self.read()),
        };
        let raw = match self.serializer.stringify(&value) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("could not serialize value for key {:?}: {err}", self.key);
                return;
            }
        };

        // In-memory first, so the latest write is observable even if the
        // durable attempt fails; a durable success deletes the entry again.
        cx.fallback().set(&self.key, &raw);
        match cx.storage().write(&self.key, &raw) {
            Ok(()) => cx.fallback().remove(&self.key),
            Err(err) => {
                log::debug!("durable write failed for key {:?}, holding in memory: {err}", self.key);
            }
        }
        cx.registry().notify(&self.key, ChangeOrigin::Local);
    }

    /// Delete the durable and in-memory entries for this key and notify.
    /// Reads afterwards return the default.
    pub fn remove(&self) {
        let Some(cx) = self.context.interactive() else {
            return;
        };
        cx.fallback().remove(&self.key);
        if let Err(err) = cx.storage().remove(&self.key) {
            log::debug!("durable remove failed for key {:?}: {err}", self.key);
        }
        cx.registry().notify(&self.key, ChangeOrigin::Local);
    }
}
