//! Cross-context change bridge over the platform `storage` event.
//!
//! The browser fires `storage` only in *other* tabs, windows, and frames
//! sharing the origin, never in the context that wrote. Local writes fan
//! out through the registry directly; this listener covers everyone else.
//! Installed once per context on first interactive mount and kept for the
//! life of the process.

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::registry::{ChangeOrigin, SubscriptionRegistry};
use crate::storage::LocalStorage;

thread_local! {
    static INSTALLED: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Install the `storage` listener for this context. Safe to call more than
/// once; only the first call attaches.
pub(crate) fn install(storage: &LocalStorage) {
    if INSTALLED.get() {
        return;
    }
    let Some(window) = web_sys::window() else {
        return;
    };

    let area = storage.area().clone();
    let callback = Closure::wrap(Box::new(move |event: web_sys::Event| {
        let Some(event) = event.dyn_ref::<web_sys::StorageEvent>() else {
            return;
        };
        // Ignore events from unrelated storage partitions (sessionStorage,
        // another area object entirely).
        let same_area = event
            .storage_area()
            .is_some_and(|event_area| js_sys::Object::is(event_area.as_ref(), area.as_ref()));
        if !same_area {
            return;
        }
        let registry = SubscriptionRegistry::process();
        match event.key() {
            Some(key) => registry.notify(&key, ChangeOrigin::External),
            // A cleared store reports no key; every slot may have changed.
            None => registry.notify_all(ChangeOrigin::External),
        }
    }) as Box<dyn FnMut(web_sys::Event)>);

    if window
        .add_event_listener_with_callback("storage", callback.as_ref().unchecked_ref())
        .is_ok()
    {
        callback.forget();
        INSTALLED.set(true);
    }
}
