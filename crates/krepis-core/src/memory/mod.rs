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

//! Bootstrap allocation for startup bookkeeping.
//!
//! Argument blocks are allocated while the process may not have brought up
//! its own allocator singleton yet, so this module goes straight to the
//! system allocator and treats failure as fatal: there is no fallback that
//! early in process life.
//!
//! Every allocation and free is counted in process-wide atomics. The
//! counters form a contract: this module increments them, and anything in
//! the program can read a consistent snapshot through
//! [`bootstrap_stats`] to verify that startup bookkeeping balances.

use std::alloc::{self, Layout};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Bytes currently held by live bootstrap blocks.
pub static CURRENT_BLOCK_BYTES: AtomicUsize = AtomicUsize::new(0);

/// The largest number of bytes ever held simultaneously.
pub static PEAK_BLOCK_BYTES: AtomicU64 = AtomicU64::new(0);

/// Total number of bootstrap allocations performed.
pub static BLOCKS_ALLOCATED: AtomicU64 = AtomicU64::new(0);

/// Total number of bootstrap blocks returned.
pub static BLOCKS_FREED: AtomicU64 = AtomicU64::new(0);

/// Cumulative bytes ever handed out by the bootstrap allocator.
pub static BLOCK_BYTES_LIFETIME: AtomicU64 = AtomicU64::new(0);

/// Allocates a bootstrap block.
///
/// Never returns null: an allocation failure this early is unrecoverable,
/// so it goes straight to [`alloc::handle_alloc_error`].
pub fn bootstrap_alloc(layout: Layout) -> *mut u8 {
    debug_assert!(layout.size() > 0);
    // SAFETY: callers only request non-zero-sized layouts.
    let ptr = unsafe { alloc::alloc(layout) };
    if ptr.is_null() {
        alloc::handle_alloc_error(layout);
    }
    let size = layout.size();
    let result = CURRENT_BLOCK_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        current.checked_add(size)
    });
    if let Ok(previous) = result {
        PEAK_BLOCK_BYTES.fetch_max((previous + size) as u64, Ordering::Relaxed);
        BLOCKS_ALLOCATED.fetch_add(1, Ordering::Relaxed);
        BLOCK_BYTES_LIFETIME.fetch_add(size as u64, Ordering::Relaxed);
    } else {
        log::error!("bootstrap byte counter overflowed during alloc! Size: {size}");
    }
    ptr
}

/// Returns a bootstrap block.
///
/// # Safety
///
/// `ptr` must have come from [`bootstrap_alloc`] with the same `layout`,
/// and must not be used afterwards.
pub unsafe fn bootstrap_dealloc(ptr: *mut u8, layout: Layout) {
    let size = layout.size();
    let result = CURRENT_BLOCK_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        current.checked_sub(size)
    });
    if result.is_err() {
        log::error!("bootstrap byte counter underflowed during dealloc! Size: {size}");
    } else {
        BLOCKS_FREED.fetch_add(1, Ordering::Relaxed);
    }
    alloc::dealloc(ptr, layout);
}

/// A consistent snapshot of the bootstrap counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapStats {
    /// Bytes currently held by live blocks.
    pub current_block_bytes: usize,
    /// The largest number of bytes ever held simultaneously.
    pub peak_block_bytes: u64,
    /// Total allocations performed.
    pub blocks_allocated: u64,
    /// Total blocks returned.
    pub blocks_freed: u64,
    /// Allocations minus frees; zero once startup bookkeeping balances.
    pub live_blocks: i64,
    /// Cumulative bytes ever handed out.
    pub block_bytes_lifetime: u64,
}

/// Reads every counter and derives the net figures.
pub fn bootstrap_stats() -> BootstrapStats {
    let blocks_allocated = BLOCKS_ALLOCATED.load(Ordering::Relaxed);
    let blocks_freed = BLOCKS_FREED.load(Ordering::Relaxed);
    BootstrapStats {
        current_block_bytes: CURRENT_BLOCK_BYTES.load(Ordering::Relaxed),
        peak_block_bytes: PEAK_BLOCK_BYTES.load(Ordering::Relaxed),
        blocks_allocated,
        blocks_freed,
        live_blocks: blocks_allocated as i64 - blocks_freed as i64,
        block_bytes_lifetime: BLOCK_BYTES_LIFETIME.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_dealloc_move_the_counters() {
        let layout = Layout::from_size_align(64, 8).unwrap();
        let before = bootstrap_stats();

        let ptr = bootstrap_alloc(layout);
        assert!(!ptr.is_null());
        let during = bootstrap_stats();
        assert!(during.blocks_allocated >= before.blocks_allocated + 1);
        assert!(during.block_bytes_lifetime >= before.block_bytes_lifetime + 64);

        // SAFETY: freshly allocated above with the same layout.
        unsafe { bootstrap_dealloc(ptr, layout) };
        let after = bootstrap_stats();
        assert!(after.blocks_freed >= before.blocks_freed + 1);
    }

    #[test]
    fn snapshot_derives_live_blocks() {
        let stats = BootstrapStats {
            blocks_allocated: 5,
            blocks_freed: 3,
            ..Default::default()
        };
        assert_eq!(stats.blocks_allocated - stats.blocks_freed, 2);
    }
}
