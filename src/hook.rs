//! The Leptos-facing hook surface.
//!
//! ARCHITECTURE
//! ============
//! `use_persisted_state` composes the engine into the reactive layer: a
//! `StateBinding` does the reading and writing, a registry subscription
//! refreshes two signals whenever the key changes anywhere in the context,
//! and a post-commit `Effect` performs the attach transition so
//! server-rendered markup and the hydrating first client render agree
//! before the live value takes over. Teardown is symmetric: `on_cleanup`
//! drops the subscription and the mount claim synchronously, so a
//! torn-down instance is never notified again.

use std::rc::Rc;

use leptos::prelude::*;

use crate::binding::{StateBinding, ValueUpdate};
use crate::context::ExecutionContext;
use crate::options::PersistedStateOptions;
use crate::registry::{MountMode, SubscriptionRegistry};

#[cfg(test)]
#[path = "hook_test.rs"]
mod hook_test;

/// Bound returned state types must satisfy. Signals hold `T` directly, so
/// the usual Leptos `Send + Sync` storage bounds apply.
pub trait PersistedValue:
    Clone + Default + PartialEq + Send + Sync + 'static
{
}

impl<T: Clone + Default + PartialEq + Send + Sync + 'static> PersistedValue for T {}

/// Writes values for one key. Cheap to clone; every clone targets the same
/// key through the same engine instance.
pub struct PersistedStateSetter<T> {
    binding: Rc<StateBinding<T>>,
}

impl<T: PersistedValue> PersistedStateSetter<T> {
    /// Replace the stored value.
    pub fn set(&self, value: T) {
        self.binding.apply(ValueUpdate::Value(value));
    }

    /// Transform the current value. The transform receives the
    /// authoritative value at write time, not one captured at render time.
    pub fn update(&self, transform: impl FnOnce(&T) -> T + 'static) {
        self.binding.apply(ValueUpdate::Transform(Box::new(transform)));
    }

    /// Apply an explicit [`ValueUpdate`].
    pub fn apply(&self, update: ValueUpdate<T>) {
        self.binding.apply(update);
    }
}

impl<T> Clone for PersistedStateSetter<T> {
    fn clone(&self) -> Self {
        Self { binding: Rc::clone(&self.binding) }
    }
}

/// Everything about one key that is not the value itself.
pub struct PersistedStateHandle<T> {
    binding: Rc<StateBinding<T>>,
    is_persistent: Signal<bool>,
}

impl<T: PersistedValue> PersistedStateHandle<T> {
    /// `true` while the latest state of the key is held durably; `false`
    /// while it lives only in the in-memory fallback. Render a warning off
    /// this rather than expecting an error from the setter.
    #[must_use]
    pub fn is_persistent(&self) -> Signal<bool> {
        self.is_persistent
    }

    /// Clear the durable and in-memory entries for the key. Subscribed
    /// instances return to the default value.
    pub fn remove(&self) {
        self.binding.remove();
    }
}

impl<T> Clone for PersistedStateHandle<T> {
    fn clone(&self) -> Self {
        Self { binding: Rc::clone(&self.binding), is_persistent: self.is_persistent }
    }
}

/// Bind component state under `key` to the context's durable store.
///
/// Returns the value signal, a setter, and a handle carrying
/// `is_persistent` and `remove`. The key is claimed exclusively: mounting a
/// second independent instance with the same key panics with guidance
/// toward [`create_persisted_state`]. All failure modes short of that
/// degrade silently (see [`PersistedStateHandle::is_persistent`]).
pub fn use_persisted_state<T: PersistedValue>(
    key: &str,
    options: PersistedStateOptions<T>,
) -> (Signal<T>, PersistedStateSetter<T>, PersistedStateHandle<T>) {
    mount(key, options, MountMode::Exclusive)
}

/// Factory for hooks that intentionally share a key. Create once at module
/// or app scope, then call [`SharedPersistedState::use_state`] from every
/// component that needs the slot; all call sites observe and mutate the
/// same value.
pub fn create_persisted_state<T: PersistedValue>(
    key: &str,
    options: PersistedStateOptions<T>,
) -> SharedPersistedState<T> {
    SharedPersistedState { key: key.to_owned(), options }
}

/// A key bound once, mountable from any number of call sites.
pub struct SharedPersistedState<T> {
    key: String,
    options: PersistedStateOptions<T>,
}

impl<T: PersistedValue> SharedPersistedState<T> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Mount one call site of the shared hook.
    pub fn use_state(&self) -> (Signal<T>, PersistedStateSetter<T>, PersistedStateHandle<T>) {
        mount(&self.key, self.options.clone(), MountMode::Shared)
    }
}

impl<T: Clone> Clone for SharedPersistedState<T> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), options: self.options.clone() }
    }
}

fn mount<T: PersistedValue>(
    key: &str,
    options: PersistedStateOptions<T>,
    mode: MountMode,
) -> (Signal<T>, PersistedStateSetter<T>, PersistedStateHandle<T>) {
    let storage_sync = options.storage_sync;
    let context = ExecutionContext::current();
    let binding = Rc::new(StateBinding::new(key.to_owned(), context.clone(), options));

    // Pre-attach read: the default (or server default), matching whatever a
    // non-interactive pass rendered for this key.
    let value = RwSignal::new(binding.read());
    let persistent = RwSignal::new(binding.is_persistent());

    if let Some(cx) = context.interactive() {
        if let Err(err) = cx.registry().register_mount(key, mode) {
            panic!("{err}");
        }

        let subscriber = Rc::clone(&binding);
        let subscription = cx.registry().subscribe(
            key,
            storage_sync,
            Rc::new(move || refresh(&subscriber, value, persistent)),
        );

        // Post-commit: attach and reconcile once against the live value.
        let attaching = Rc::clone(&binding);
        Effect::new(move || {
            if attaching.attach() {
                refresh(&attaching, value, persistent);
            }
        });

        let cleanup_key = key.to_owned();
        on_cleanup(move || {
            let registry = SubscriptionRegistry::process();
            registry.unsubscribe(&cleanup_key, subscription);
            registry.release_mount(&cleanup_key);
        });
    }

    let setter = PersistedStateSetter { binding: Rc::clone(&binding) };
    let handle = PersistedStateHandle { binding, is_persistent: persistent.into() };
    (value.into(), setter, handle)
}

/// Re-read through the engine and push into the signals, skipping renders
/// when nothing visible changed.
fn refresh<T: PersistedValue>(binding: &StateBinding<T>, value: RwSignal<T>, persistent: RwSignal<bool>) {
    let next = binding.read();
    if value.get_untracked() != next {
        value.set(next);
    }
    let now_persistent = binding.is_persistent();
    if persistent.get_untracked() != now_persistent {
        persistent.set(now_persistent);
    }
}
