// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal busy-wait lock for the registration window.
//!
//! Registration can race between threads before any richer primitive is
//! guaranteed to exist, so the registry guards its lists with a single
//! atomic flag and a spin. Critical sections here are a handful of pointer
//! writes; nothing ever holds the lock across user code.

use std::sync::atomic::{AtomicBool, Ordering};

/// Busy-wait mutual exclusion around the registry's bootstrap lists.
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    /// A new, unlocked lock.
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Spins until the lock is acquired, then returns a guard that
    /// releases it on drop.
    pub fn lock(&self) -> SpinGuard<'_> {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        SpinGuard { lock: self }
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a [`SpinLock`] until dropped.
pub struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::thread;

    struct Shared {
        lock: SpinLock,
        value: UnsafeCell<u64>,
    }

    unsafe impl Sync for Shared {}

    #[test]
    fn serializes_concurrent_increments() {
        const THREADS: u64 = 4;
        const ROUNDS: u64 = 10_000;

        let shared = Shared {
            lock: SpinLock::new(),
            value: UnsafeCell::new(0),
        };

        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    // Capture the whole struct (which is `Sync`) rather than
                    // the individual `UnsafeCell` field, so the closure is `Send`.
                    let shared = &shared;
                    for _ in 0..ROUNDS {
                        let _guard = shared.lock.lock();
                        // SAFETY: the guard is held for this access.
                        unsafe { *shared.value.get() += 1 };
                    }
                });
            }
        });

        assert_eq!(unsafe { *shared.value.get() }, THREADS * ROUNDS);
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = SpinLock::new();
        drop(lock.lock());
        drop(lock.lock());
    }
}
