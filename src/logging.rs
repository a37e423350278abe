//! Console logging bootstrap for browser builds.
//!
//! The engine reports degraded persistence and corrupt stored values
//! through `log`. Call this once from the app's hydrate entry point to
//! route those records to the browser console; SSR and native builds no-op
//! and leave logger installation to the host.

/// Install the console logger and panic hook. Safe to call more than once;
/// later calls lose to whichever logger registered first.
pub fn init_browser_logging(level: log::Level) {
    #[cfg(feature = "hydrate")]
    {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(level);
    }
    #[cfg(not(feature = "hydrate"))]
    {
        let _ = level;
    }
}
