//! The global interpreter lock.
//!
//! One process-wide reentrant lock. Managed code runs with it held; native slot calls give it up
//! through [`crate::VirtualMachine::allow_threads`].

use crossbeam_utils::atomic::AtomicCell;
use lock_api::RawMutex as _;
use parking_lot::RawMutex;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

pub struct GlobalInterpreterLock {
    raw: RawMutex,
    owner: AtomicCell<Option<ThreadId>>,
    depth: AtomicUsize,
}

pub static GIL: GlobalInterpreterLock = GlobalInterpreterLock::new();

impl GlobalInterpreterLock {
    pub const fn new() -> Self {
        Self {
            raw: RawMutex::INIT,
            owner: AtomicCell::new(None),
            depth: AtomicUsize::new(0),
        }
    }

    pub fn owned_by_current_thread(&self) -> bool {
        self.owner.load() == Some(thread::current().id())
    }

    /// Acquire, reentrantly, for the lifetime of the guard.
    pub fn acquire(&self) -> GilGuard<'_> {
        self.lock_with_depth(1);
        GilGuard { gil: self }
    }

    fn lock_with_depth(&self, depth: usize) {
        if self.owned_by_current_thread() {
            self.depth.fetch_add(depth, Ordering::Relaxed);
            return;
        }
        self.raw.lock();
        self.owner.store(Some(thread::current().id()));
        self.depth.store(depth, Ordering::Relaxed);
    }

    fn unlock_one(&self) {
        assert!(
            self.owned_by_current_thread(),
            "GIL released by a thread that does not hold it"
        );
        if self.depth.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.owner.store(None);
            // SAFETY: the current thread owns the raw mutex, checked above.
            unsafe { self.raw.unlock() };
        }
    }

    /// Fully release the lock held by this thread. Returns the depth to restore with
    /// [`Self::restore`].
    pub(crate) fn release_all(&self) -> usize {
        assert!(
            self.owned_by_current_thread(),
            "GIL released by a thread that does not hold it"
        );
        let depth = self.depth.swap(0, Ordering::Relaxed);
        self.owner.store(None);
        // SAFETY: the current thread owns the raw mutex, checked above.
        unsafe { self.raw.unlock() };
        depth
    }

    pub(crate) fn restore(&self, depth: usize) {
        self.lock_with_depth(depth);
    }
}

impl Default for GlobalInterpreterLock {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use]
pub struct GilGuard<'a> {
    gil: &'a GlobalInterpreterLock,
}

impl Drop for GilGuard<'_> {
    fn drop(&mut self) {
        self.gil.unlock_one();
    }
}
