use std::env;
use std::ffi::OsStr;

/// Sets an environment variable for the lifetime of the guard and restores the previous value (or
/// removes the variable) on drop.
///
/// Environment mutation races with other threads reading the environment, so tests using this
/// should be marked `#[serial]`.
///
/// ```no_run
/// use utils::EnvVarGuard;
///
/// let _guard = EnvVarGuard::set("FW_SDK_TRANSFER_PROGRESS_INTERVAL", "50ms");
/// ```
pub struct EnvVarGuard {
    key: String,
    prev: Option<String>,
}

impl EnvVarGuard {
    pub fn set(key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        let key = key.into();
        let prev = env::var(&key).ok();
        unsafe {
            env::set_var(&key, value);
        }
        Self { key, prev }
    }

    /// Removes the variable until the guard is dropped.
    pub fn unset(key: impl Into<String>) -> Self {
        let key = key.into();
        let prev = env::var(&key).ok();
        unsafe {
            env::remove_var(&key);
        }
        Self { key, prev }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe {
                env::set_var(&self.key, v);
            },
            None => unsafe {
                env::remove_var(&self.key);
            },
        }
    }
}
