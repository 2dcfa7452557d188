use std::sync::{Mutex, MutexGuard};
use tracing::warn;

pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("mutex poisoned in {context}; recovering");
            poisoned.into_inner()
        }
    }
}
