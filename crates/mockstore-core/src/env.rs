//! Scoped process environment overrides.
//!
//! The process environment is shared by every thread, so an [`EnvOverride`]
//! holds a global lock for as long as it is alive. Overrides therefore never
//! interleave, and the lock is released only after the prior values have
//! been put back. Overrides nest on the thread that already holds the lock,
//! which keeps it until its last override is dropped.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    env,
    ffi::OsString,
    marker::PhantomData,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

static ENV_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static OVERRIDE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static HELD_LOCK: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

/// A copy of the process environment taken at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        // Variables that are not valid UTF-8 are skipped.
        Self {
            vars: env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Captures the environment minus exactly `key`.
    pub fn capture_without(key: &str) -> Self {
        let mut snapshot = Self::capture();
        snapshot.vars.remove(key);
        snapshot
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for EnvSnapshot {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.into_iter()
    }
}

/// Applies environment variables until dropped, then restores the previous
/// environment exactly, including variables that are not valid UTF-8.
///
/// Nested overrides must be dropped in reverse order of creation to restore
/// the right values. The lock is held until the last override on the thread
/// is gone, whatever the order.
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct EnvOverride {
    previous: BTreeMap<OsString, OsString>,
    // The lock lives in a thread-local, so the guard must stay on this thread.
    _not_send: PhantomData<MutexGuard<'static, ()>>,
}

impl EnvOverride {
    /// Sets every variable in `vars`. With `clear`, variables absent from
    /// `vars` are removed first.
    ///
    /// Panics like [`env::set_var`] on an invalid key or value, after putting
    /// the previous environment back.
    pub fn apply<I, K, V>(vars: I, clear: bool) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let depth = OVERRIDE_DEPTH.get();
        if depth == 0 {
            let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            HELD_LOCK.with_borrow_mut(|held| *held = Some(lock));
        }
        OVERRIDE_DEPTH.set(depth + 1);
        // From here on, unwinding out of this function runs `Drop`.
        let guard = Self {
            previous: env::vars_os().collect(),
            _not_send: PhantomData,
        };

        if clear {
            for key in guard
                .previous
                .keys()
                .filter(|key| key.to_str().is_none_or(|key| !vars.contains_key(key)))
            {
                // SAFETY: environment mutation in this crate only happens while holding ENV_LOCK.
                unsafe { env::remove_var(key) };
            }
        }
        for (key, value) in &vars {
            // SAFETY: see above.
            unsafe { env::set_var(key, value) };
        }
        debug!(applied = vars.len(), clear, "environment override applied");

        guard
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        let current: Vec<OsString> = env::vars_os().map(|(key, _)| key).collect();
        for key in current.iter().filter(|key| !self.previous.contains_key(*key)) {
            // SAFETY: this thread still holds ENV_LOCK.
            unsafe { env::remove_var(key) };
        }
        for (key, value) in &self.previous {
            if env::var_os(key).as_ref() != Some(value) {
                // SAFETY: this thread still holds ENV_LOCK.
                unsafe { env::set_var(key, value) };
            }
        }

        let depth = OVERRIDE_DEPTH.get().saturating_sub(1);
        OVERRIDE_DEPTH.set(depth);
        if depth == 0 {
            HELD_LOCK.with_borrow_mut(|held| held.take());
        }
        debug!("environment override reverted");
    }
}

/// Runs `f` with `vars` applied, restoring the environment afterwards even
/// if `f` panics.
pub fn with_env<I, K, V, F, T>(vars: I, clear: bool, f: F) -> T
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
    F: FnOnce() -> T,
{
    let _guard = EnvOverride::apply(vars, clear);
    f()
}

#[cfg(test)]
mod tests {
    use std::{panic, sync::TryLockError};

    use super::*;

    #[test]
    fn snapshot_excludes_one_key() {
        let snapshot: EnvSnapshot = [
            ("AWS_PROFILE".to_string(), "prod".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ]
        .into_iter()
        .collect();
        assert!(snapshot.contains("AWS_PROFILE"));
        assert_eq!(snapshot.len(), 2);

        let captured = EnvSnapshot::capture_without("PATH");
        assert!(!captured.contains("PATH"));
    }

    #[test]
    fn override_restores_previous_values() {
        let before = with_env([("MOCKSTORE_ENV_TEST_A", "outer")], false, || {
            env::var("MOCKSTORE_ENV_TEST_A").ok()
        });
        assert_eq!(before.as_deref(), Some("outer"));
        assert!(env::var("MOCKSTORE_ENV_TEST_A").is_err());
    }

    #[test]
    fn clear_removes_unlisted_variables_for_the_scope() {
        let seen = with_env([("MOCKSTORE_ENV_TEST_ONLY", "1")], true, || {
            EnvSnapshot::capture().into_iter().map(|(k, _)| k).collect::<Vec<_>>()
        });
        assert_eq!(seen, vec!["MOCKSTORE_ENV_TEST_ONLY".to_string()]);
        assert!(env::var("MOCKSTORE_ENV_TEST_ONLY").is_err());
    }

    #[test]
    fn nested_overrides_unwind_in_order() {
        with_env([("MOCKSTORE_ENV_TEST_NEST", "outer")], false, || {
            with_env([("MOCKSTORE_ENV_TEST_NEST", "inner")], false, || {
                assert_eq!(env::var("MOCKSTORE_ENV_TEST_NEST").as_deref(), Ok("inner"));
            });
            assert_eq!(env::var("MOCKSTORE_ENV_TEST_NEST").as_deref(), Ok("outer"));
        });
        assert!(env::var("MOCKSTORE_ENV_TEST_NEST").is_err());
    }

    #[test]
    fn out_of_order_drop_keeps_lock_until_last_guard() {
        let outer = EnvOverride::apply([("MOCKSTORE_ENV_TEST_ORDER", "outer")], false);
        let inner = EnvOverride::apply([("MOCKSTORE_ENV_TEST_ORDER", "inner")], false);
        drop(outer);
        assert_eq!(OVERRIDE_DEPTH.get(), 1);
        assert!(matches!(ENV_LOCK.try_lock(), Err(TryLockError::WouldBlock)));
        drop(inner);
        assert_eq!(OVERRIDE_DEPTH.get(), 0);
        assert!(HELD_LOCK.with_borrow(Option::is_none));
        // Dropped out of order, the inner guard puts back what it saw.
        assert_eq!(env::var("MOCKSTORE_ENV_TEST_ORDER").as_deref(), Ok("outer"));
    }

    #[test]
    fn invalid_key_restores_cleared_environment() {
        with_env([("MOCKSTORE_ENV_TEST_KEEP", "1")], false, || {
            let result = panic::catch_unwind(|| {
                with_env([("MOCKSTORE=BAD", "v")], true, || ());
            });
            assert!(result.is_err());
            assert_eq!(env::var("MOCKSTORE_ENV_TEST_KEEP").as_deref(), Ok("1"));
            assert_eq!(OVERRIDE_DEPTH.get(), 1);
        });
        assert_eq!(OVERRIDE_DEPTH.get(), 0);

        // The lock must be free again for other threads.
        let other = std::thread::spawn(|| {
            with_env([("MOCKSTORE_ENV_TEST_OTHER", "1")], false, || {
                env::var("MOCKSTORE_ENV_TEST_OTHER").ok()
            })
        });
        assert_eq!(other.join().unwrap().as_deref(), Some("1"));
    }

    #[cfg(unix)]
    #[test]
    fn restores_non_utf8_values() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let raw = OsStr::from_bytes(b"\xff\xfe");
        with_env([("MOCKSTORE_ENV_TEST_RAW", "placeholder")], false, || {
            // SAFETY: the enclosing override holds ENV_LOCK on this thread.
            unsafe { env::set_var("MOCKSTORE_ENV_TEST_RAW", raw) };

            with_env([("MOCKSTORE_ENV_TEST_RAW", "text")], false, || {
                assert_eq!(env::var("MOCKSTORE_ENV_TEST_RAW").as_deref(), Ok("text"));
            });
            assert_eq!(env::var_os("MOCKSTORE_ENV_TEST_RAW").as_deref(), Some(raw));

            with_env([("MOCKSTORE_ENV_TEST_UNRELATED", "1")], true, || {
                assert_eq!(env::var_os("MOCKSTORE_ENV_TEST_RAW"), None);
            });
            assert_eq!(env::var_os("MOCKSTORE_ENV_TEST_RAW").as_deref(), Some(raw));
        });
        assert_eq!(env::var_os("MOCKSTORE_ENV_TEST_RAW"), None);
    }

    #[test]
    fn restores_after_panic() {
        let result = panic::catch_unwind(|| {
            with_env([("MOCKSTORE_ENV_TEST_PANIC", "boom")], false, || {
                panic!("body failed");
            })
        });
        assert!(result.is_err());
        assert!(env::var("MOCKSTORE_ENV_TEST_PANIC").is_err());
    }
}
