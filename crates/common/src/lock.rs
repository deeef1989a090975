//! [`lock_api`]-based lock aliases backed by `parking_lot`.
//!
//! Everything in the slot machinery that needs interior mutability goes through these aliases
//! so the raw lock implementation can be swapped in one place.

use lock_api::{
    MappedMutexGuard, MappedRwLockReadGuard, Mutex, MutexGuard, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

pub use parking_lot::{RawMutex, RawRwLock};
pub use std::sync::OnceLock as OnceCell;

pub type PyMutex<T> = Mutex<RawMutex, T>;
pub type PyMutexGuard<'a, T> = MutexGuard<'a, RawMutex, T>;
pub type PyMappedMutexGuard<'a, T> = MappedMutexGuard<'a, RawMutex, T>;

pub type PyRwLock<T> = RwLock<RawRwLock, T>;
pub type PyRwLockReadGuard<'a, T> = RwLockReadGuard<'a, RawRwLock, T>;
pub type PyMappedRwLockReadGuard<'a, T> = MappedRwLockReadGuard<'a, RawRwLock, T>;
pub type PyRwLockWriteGuard<'a, T> = RwLockWriteGuard<'a, RawRwLock, T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rwlock_readers_share() {
        let lock = PyRwLock::new(vec![1, 2, 3]);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(a.len(), b.len());
        drop((a, b));
        lock.write().push(4);
        assert_eq!(lock.read().len(), 4);
    }

    #[test]
    fn mapped_mutex_guard() {
        let mutex = PyMutex::new((1u8, String::from("slot")));
        let guard = PyMutexGuard::map(mutex.lock(), |(_, name)| name);
        assert_eq!(guard.as_str(), "slot");
    }
}
