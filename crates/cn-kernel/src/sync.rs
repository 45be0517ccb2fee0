// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Cellnode Firmware Team

//! Bounded-wait mutual exclusion
//!
//! Every shared resource in the firmware (heaps, the modem channel, the
//! MQTT session, the task registry, queues) is guarded by a binary mutex
//! whose acquisition is bounded. A caller that cannot get the lock in time
//! does not perform the operation and reports that to its own caller; no
//! task ever blocks forever on one of these.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use cn_common::time::Deadline;

use crate::port::Kernel;

/// Binary mutex with bounded acquisition
pub struct BoundedMutex<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is serialized by `locked`; only the holder of
// a `BoundedGuard` can reach it, and a guard exists for at most one holder.
unsafe impl<T: Send> Sync for BoundedMutex<T> {}
// SAFETY: moving the mutex moves the owned value.
unsafe impl<T: Send> Send for BoundedMutex<T> {}

impl<T> BoundedMutex<T> {
    /// Create an unlocked mutex owning `value`
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Take the lock if it is free, without waiting
    pub fn try_lock(&self) -> Option<BoundedGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BoundedGuard { mutex: self })
    }

    /// Take the lock, yielding to the kernel for at most `timeout_ms`
    ///
    /// Returns `None` when the lock was not obtained in time.
    pub fn lock_within(&self, kernel: &dyn Kernel, timeout_ms: u32) -> Option<BoundedGuard<'_, T>> {
        if let Some(guard) = self.try_lock() {
            return Some(guard);
        }
        let deadline = Deadline::new(kernel.ticks(), kernel.ms_to_ticks(timeout_ms));
        loop {
            kernel.yield_now();
            if let Some(guard) = self.try_lock() {
                return Some(guard);
            }
            if deadline.is_expired(kernel.ticks()) {
                return None;
            }
        }
    }

    /// Whether some holder currently owns the lock
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Mutable access through an exclusive borrow, no locking needed
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consume the mutex, returning the guarded value
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for BoundedMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Exclusive access to the value of a [`BoundedMutex`]; unlocks on drop
pub struct BoundedGuard<'a, T> {
    mutex: &'a BoundedMutex<T>,
}

impl<T> Deref for BoundedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held by us.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for BoundedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held by us, and `&mut self`
        // prevents a second live reference through this guard.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for BoundedGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;

    static NAMES: &[&str] = &["T"];

    #[test]
    fn test_try_lock_is_exclusive() {
        let m = BoundedMutex::new(5u32);
        let g = m.try_lock().unwrap();
        assert!(m.is_locked());
        assert!(m.try_lock().is_none());
        drop(g);
        assert!(!m.is_locked());
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn test_lock_within_times_out() {
        let k = SimKernel::new(NAMES);
        let m = BoundedMutex::new(());
        let _held = m.try_lock().unwrap();

        let start = k.ticks();
        assert!(m.lock_within(&k, 100).is_none());
        assert!(start.elapsed(k.ticks()) >= 100);
    }

    #[test]
    fn test_guard_writes_are_visible() {
        let k = SimKernel::new(NAMES);
        let m = BoundedMutex::new(1u32);
        {
            let mut g = m.lock_within(&k, 10).unwrap();
            *g += 41;
        }
        assert_eq!(*m.try_lock().unwrap(), 42);
        assert_eq!(m.into_inner(), 42);
    }
}
