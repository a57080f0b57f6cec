use std::sync::{Mutex, MutexGuard};

/// Acquire mutex guard, ignoring poisoning.
///
/// A panicking event handler must not wedge the pending table or the
/// subscriber registry for everyone else.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
