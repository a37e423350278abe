//! Persistent component state for Leptos, backed by browser `localStorage`.
//!
//! `use_persisted_state` binds a reactive value to one storage key and
//! keeps every consumer of that key consistent: other components in the
//! same context update through a subscription registry, other tabs and
//! windows update through the platform `storage` event, and a store that
//! fails (quota, privacy mode, no browser at all) degrades to an in-memory
//! fallback that is observable through an `is_persistent` flag instead of
//! an exception.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`hook`] | `use_persisted_state`, the shared-hook factory, setter and handle types |
//! | [`binding`] | Per-instance engine: read/write/remove paths and the attach transition |
//! | [`options`] | Per-hook configuration builder |
//! | [`context`] | Interactive vs non-interactive execution context capability |
//! | [`storage`] | Durable store adapter trait, `localStorage` and in-memory backends |
//! | [`fallback`] | Context-wide in-memory fallback for keys the store rejected |
//! | [`registry`] | Change fan-out, cross-context filtering, and mount tracking |
//! | [`serializer`] | Pluggable string codec, JSON by default |
//! | [`logging`] | Console logging bootstrap for browser builds |
//!
//! All operations are synchronous and run on the context's single thread;
//! "concurrency" is the interleaving of hook instances and of browsing
//! contexts, not parallelism.

pub mod binding;
#[cfg(feature = "hydrate")]
mod bridge;
pub mod context;
pub mod fallback;
pub mod hook;
pub mod logging;
pub mod options;
pub mod registry;
pub mod serializer;
mod snapshot;
pub mod storage;

pub use binding::{DefaultValue, StateBinding, ValueUpdate};
pub use context::{ExecutionContext, InteractiveContext};
pub use fallback::FallbackMap;
pub use hook::{
    PersistedStateHandle, PersistedStateSetter, PersistedValue, SharedPersistedState,
    create_persisted_state, use_persisted_state,
};
pub use logging::init_browser_logging;
pub use options::PersistedStateOptions;
pub use registry::{ChangeOrigin, DuplicateKeyError, MountMode, SubscriptionRegistry};
pub use serializer::{CodecError, JsonSerializer, ParseErrorHandler, Serializer};
#[cfg(feature = "hydrate")]
pub use storage::LocalStorage;
pub use storage::{FailureMode, MemoryStorage, StorageBackend, StorageError, UnavailableStorage};
