//! Execution context capability: interactive or not, decided once.
//!
//! DESIGN
//! ======
//! Every environment question the engine has is answered by one two-variant
//! capability instead of scattered runtime probes. A browser tab with a
//! working `localStorage` is `Interactive` over that store; a browser tab
//! whose storage access throws is still `Interactive`, but over a backend
//! that fails every operation and therefore keeps all keys on the in-memory
//! fallback; a server render pass is `NonInteractive` and every operation
//! is a pure no-op. The probe runs once per context and the answer is
//! cached for the life of the process.

use std::rc::Rc;

use crate::fallback::FallbackMap;
use crate::registry::SubscriptionRegistry;
use crate::storage::StorageBackend;

#[cfg(test)]
#[path = "context_test.rs"]
mod context_test;

thread_local! {
    static CURRENT: ExecutionContext = ExecutionContext::detect();
}

/// The environment a hook instance runs in.
#[derive(Clone)]
pub enum ExecutionContext {
    /// A live, storage-capable context (a browser tab, window, or frame).
    Interactive(InteractiveContext),
    /// A rendering pass with no storage: reads yield defaults, writes and
    /// removals do nothing, and `is_persistent` reports `true` so no
    /// transient degradation shows before a live context takes over.
    NonInteractive,
}

/// Capabilities of an interactive context: the durable backend plus the
/// context-wide fallback map and subscription registry.
#[derive(Clone)]
pub struct InteractiveContext {
    storage: Rc<dyn StorageBackend>,
    fallback: Rc<FallbackMap>,
    registry: Rc<SubscriptionRegistry>,
}

impl InteractiveContext {
    /// Assemble a context from explicit parts. Tests inject a
    /// [`crate::storage::MemoryStorage`] and fresh singletons here.
    #[must_use]
    pub fn with_parts(
        storage: Rc<dyn StorageBackend>,
        fallback: Rc<FallbackMap>,
        registry: Rc<SubscriptionRegistry>,
    ) -> Self {
        Self { storage, fallback, registry }
    }

    #[must_use]
    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    #[must_use]
    pub fn fallback(&self) -> &FallbackMap {
        &self.fallback
    }

    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }
}

impl ExecutionContext {
    /// The context this process runs in, probed once and cached.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(Clone::clone)
    }

    #[cfg(feature = "hydrate")]
    fn detect() -> Self {
        use crate::storage::{LocalStorage, UnavailableStorage};

        let storage: Rc<dyn StorageBackend> = match LocalStorage::obtain() {
            Some(local) => {
                crate::bridge::install(&local);
                Rc::new(local)
            }
            None => {
                if web_sys::window().is_none() {
                    return Self::NonInteractive;
                }
                log::warn!("localStorage is inaccessible; persisting in memory only");
                Rc::new(UnavailableStorage)
            }
        };
        Self::Interactive(InteractiveContext::with_parts(
            storage,
            FallbackMap::process(),
            SubscriptionRegistry::process(),
        ))
    }

    #[cfg(not(feature = "hydrate"))]
    fn detect() -> Self {
        Self::NonInteractive
    }

    /// The interactive capabilities, if this context has any.
    #[must_use]
    pub fn interactive(&self) -> Option<&InteractiveContext> {
        match self {
            Self::Interactive(cx) => Some(cx),
            Self::NonInteractive => None,
        }
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive(_))
    }
}
