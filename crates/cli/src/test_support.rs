use std::sync::{Mutex, OnceLock};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Serializes tests that mutate the process environment.
pub(crate) fn with_locked_env<R>(run: impl FnOnce() -> R) -> R {
    let _guard = env_lock().lock().unwrap();
    run()
}

/// Sets an environment variable from a test body.
///
/// # Safety
/// `std::env::set_var` is unsafe on this toolchain; callers must hold the
/// lock via `with_locked_env` so parallel tests cannot race.
pub(crate) fn set_env_var(key: &str, value: &str) {
    // SAFETY: serialized by with_locked_env at every call site.
    unsafe {
        std::env::set_var(key, value);
    }
}

/// Removes an environment variable from a test body.
///
/// # Safety
/// Same contract as [`set_env_var`].
pub(crate) fn remove_env_var(key: &str) {
    // SAFETY: serialized by with_locked_env at every call site.
    unsafe {
        std::env::remove_var(key);
    }
}
