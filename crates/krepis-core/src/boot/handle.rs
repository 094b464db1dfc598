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

//! The user-facing wrapper around one deferred global.
//!
//! A [`Handle`] bundles a type-erased [`Node`] with inline, uninitialized
//! storage for the wrapped value: one unit, no extra indirection. The node
//! sits first in a `repr(C)` layout, so the single dispatch function can
//! recover the typed handle from the node address alone; that is what lets
//! every node stay the same fixed size regardless of the type behind it.
//!
//! Handles are const-constructible and meant to live in `static`s:
//!
//! ```
//! use krepis_core::boot::{Group, Handle, Registry, Subsystem};
//!
//! struct Clock {
//!     hz: u32,
//! }
//!
//! impl Subsystem for Clock {
//!     type Args = u32;
//!
//!     fn create(hz: &u32) -> Self {
//!         Clock { hz: *hz }
//!     }
//! }
//!
//! static TIMING: Group = Group::new("timing");
//! static CLOCK: Handle<Clock> = Handle::with_args("clock", "timing", 240);
//!
//! let registry = Registry::new();
//! registry.register_group(&TIMING);
//! registry.install(&CLOCK);
//! registry.link();
//! registry.init();
//! assert_eq!(CLOCK.get().hz, 240);
//! registry.fini();
//! ```

use std::alloc::Layout;
use std::cell::UnsafeCell;
use std::mem::{self, MaybeUninit};
use std::ops::Deref;
use std::ptr;

use crate::boot::node::{flags, ArgHeader, DispatchOp, Node};
use crate::boot::registry::Registry;
use crate::boot::tagged::TaggedPtr;
use crate::memory;

/// How a wrapped type is produced from its construction arguments.
///
/// The one seam a type needs in order to live behind a [`Handle`]; it has
/// no other awareness of the registry, and types from other crates are
/// wrapped in a newtype.
pub trait Subsystem: Sized + Send + 'static {
    /// Construction arguments. Cloned when a declaration seed is
    /// materialized into a heap argument block.
    type Args: Clone + Send + 'static;

    /// Builds the value. Runs during the single-threaded bring-up phase;
    /// a failure here is fatal by design, so there is nothing to return
    /// but the value.
    fn create(args: &Self::Args) -> Self;
}

/// Heap-allocated argument storage. The `align(8)` header guarantees the
/// three flag bits in the node's tagged pointer.
#[repr(C, align(8))]
struct ArgBlock<A> {
    args: A,
}

/// One deferred global: bookkeeping node, declaration arguments, and
/// inline storage for the value.
///
/// The wrapped value does not exist until the node's `init` runs and
/// ceases to exist the instant `fini` runs. Access through
/// [`get`](Handle::get) or `Deref` is checked against that window and
/// panics outside it; [`try_get`](Handle::try_get) is the non-panicking
/// form.
#[repr(C)]
pub struct Handle<T: Subsystem> {
    node: Node,
    seed: Option<T::Args>,
    slot: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the slot is written only by the single-threaded bring-up phase
// and published through the initialized flag (release store, acquire
// load); the seed is never written after construction.
unsafe impl<T> Sync for Handle<T>
where
    T: Subsystem + Sync,
    T::Args: Sync,
{
}

impl<T: Subsystem> Handle<T> {
    /// Declares a global whose construction arguments are known at
    /// declaration time. The arguments are moved to a heap block when the
    /// handle is installed into a registry.
    pub const fn with_args(name: &'static str, group: &'static str, args: T::Args) -> Self {
        Self {
            node: Node::new(name, group, dispatch::<T>),
            seed: Some(args),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Declares a global whose arguments are only known at runtime; it
    /// must be brought up through [`init_with`](Handle::init_with).
    pub const fn deferred(name: &'static str, group: &'static str) -> Self {
        Self {
            node: Node::new(name, group, dispatch::<T>),
            seed: None,
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// The bookkeeping node behind this handle.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The global's name.
    pub fn name(&self) -> &'static str {
        self.node.name()
    }

    /// Whether the wrapped value currently exists.
    pub fn is_initialized(&self) -> bool {
        self.node.is_initialized()
    }

    /// Includes or excludes this global from sweeps.
    pub fn set_enabled(&self, enabled: bool) {
        self.node.set_enabled(enabled);
    }

    /// Constructs the wrapped value from the attached argument block, or
    /// from the declaration seed if none is attached.
    ///
    /// # Panics
    ///
    /// Panics on lifecycle misuse (already initialized, disabled), or if
    /// this is a [`deferred`](Handle::deferred) handle with no arguments
    /// attached yet.
    pub fn init(&'static self, registry: &Registry) {
        self.node.init(registry);
    }

    /// Rebuilds the argument block with `args`, then initializes. For
    /// globals whose parameters are only known at runtime, such as a
    /// worker-pool size.
    pub fn init_with(&'static self, registry: &Registry, args: T::Args) {
        self.attach_args(args);
        self.node.init(registry);
    }

    /// Destroys the wrapped value and frees the argument block.
    ///
    /// # Panics
    ///
    /// Panics if the value is not currently initialized.
    pub fn fini(&'static self, registry: &Registry) {
        self.node.fini(registry);
    }

    /// The wrapped value, if it currently exists.
    pub fn try_get(&self) -> Option<&T> {
        if self.node.is_initialized() {
            // SAFETY: the initialized flag is published only after the
            // slot was written, and cleared before it is dropped.
            Some(unsafe { (*self.slot.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// The wrapped value.
    ///
    /// # Panics
    ///
    /// Panics if the value does not currently exist, which means access
    /// before `init` or after `fini`: always an ordering bug.
    pub fn get(&self) -> &T {
        match self.try_get() {
            Some(value) => value,
            None => panic!(
                "global `{}` accessed outside its initialized lifetime",
                self.node.name()
            ),
        }
    }

    /// Moves the declaration seed into a heap argument block. Zero-sized
    /// argument types stay in the seed; there is nothing to put on the
    /// heap.
    pub(crate) fn materialize_seed(&'static self) {
        if mem::size_of::<T::Args>() == 0 {
            return;
        }
        if let Some(seed) = &self.seed {
            self.attach_args(seed.clone());
        }
    }

    fn attach_args(&'static self, args: T::Args) {
        let state = self.node.state();
        if state.tag() & flags::HAS_ARGS != 0 {
            let old = state.ptr() as *mut ArgBlock<T::Args>;
            // SAFETY: a set HAS_ARGS flag means this pointer is the live
            // block allocated below on an earlier attach.
            unsafe { free_args::<T::Args>(old) };
        }
        if mem::size_of::<T::Args>() == 0 {
            self.node
                .set_state(TaggedPtr::null(state.tag() & !flags::HAS_ARGS));
            return;
        }
        let block = memory::bootstrap_alloc(Layout::new::<ArgBlock<T::Args>>())
            as *mut ArgBlock<T::Args>;
        // SAFETY: freshly allocated with the layout of ArgBlock<T::Args>.
        unsafe { block.write(ArgBlock { args }) };
        self.node.set_state(TaggedPtr::new(
            block.cast::<ArgHeader>(),
            state.tag() | flags::HAS_ARGS,
        ));
    }
}

impl<T: Subsystem<Args = ()>> Handle<T> {
    /// Declares a global that takes no construction arguments.
    pub const fn new(name: &'static str, group: &'static str) -> Self {
        Self::with_args(name, group, ())
    }
}

impl<T: Subsystem> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

/// Drops the arguments and returns the block to the bootstrap allocator.
///
/// # Safety
///
/// `block` must be a live block previously produced by `attach_args` for
/// the same `A`, and must not be used afterwards.
unsafe fn free_args<A>(block: *mut ArgBlock<A>) {
    ptr::drop_in_place(block);
    memory::bootstrap_dealloc(block.cast::<u8>(), Layout::new::<ArgBlock<A>>());
}

/// The per-type dispatch function stored in every node this module
/// creates.
///
/// # Safety
///
/// `node` must be embedded in a `Handle<T>` for the same `T` this function
/// was monomorphised with; the caller must uphold the single-orchestrator
/// lifecycle contract for the requested operation.
unsafe fn dispatch<T: Subsystem>(op: DispatchOp, node: &Node) {
    // SAFETY: the node is the first field of the repr(C) handle, so the
    // node address is the handle address.
    let handle = &*(node as *const Node as *const Handle<T>);
    match op {
        DispatchOp::ConstructValue => {
            let state = node.state();
            let value = if state.tag() & flags::HAS_ARGS != 0 {
                let block = state.ptr() as *const ArgBlock<T::Args>;
                // SAFETY: HAS_ARGS guarantees a live block of this type.
                T::create(&(*block).args)
            } else if let Some(seed) = &handle.seed {
                T::create(seed)
            } else {
                panic!(
                    "global `{}` has no construction arguments; bring it up with init_with",
                    node.name()
                );
            };
            // SAFETY: the slot is uninitialized here; the node's
            // initialized flag is still clear.
            (*handle.slot.get()).write(value);
        }
        DispatchOp::DestructValue => {
            // SAFETY: the caller checked the initialized flag, so the
            // slot holds a live value.
            ptr::drop_in_place((*handle.slot.get()).as_mut_ptr());
        }
        DispatchOp::DestructArguments => {
            let state = node.state();
            let block = state.ptr() as *mut ArgBlock<T::Args>;
            debug_assert!(!block.is_null());
            // SAFETY: HAS_ARGS was checked by the caller; the block is
            // live and of this type.
            free_args::<T::Args>(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Beacon {
        strength: u32,
    }

    impl Subsystem for Beacon {
        type Args = u32;

        fn create(strength: &u32) -> Self {
            Beacon {
                strength: *strength,
            }
        }
    }

    #[test]
    fn value_window_is_checked() {
        static TESTS: crate::boot::Group = crate::boot::Group::new("tests");
        static BEACON: Handle<Beacon> = Handle::with_args("beacon", "tests", 9);

        let registry = Registry::new();
        registry.register_group(&TESTS);
        registry.install(&BEACON);
        registry.link();

        assert!(BEACON.try_get().is_none());
        BEACON.init(&registry);
        assert_eq!(BEACON.get().strength, 9);
        assert_eq!(BEACON.strength, 9);
        BEACON.fini(&registry);
        assert!(BEACON.try_get().is_none());
    }

    #[test]
    #[should_panic(expected = "outside its initialized lifetime")]
    fn get_panics_before_init() {
        static BEACON: Handle<Beacon> = Handle::with_args("beacon", "tests", 1);
        let _ = BEACON.get();
    }

    #[test]
    fn runtime_arguments_replace_the_seed_block() {
        static TESTS: crate::boot::Group = crate::boot::Group::new("tests");
        static BEACON: Handle<Beacon> = Handle::with_args("beacon", "tests", 2);

        let registry = Registry::new();
        registry.register_group(&TESTS);
        registry.install(&BEACON);
        registry.link();

        BEACON.init_with(&registry, 17);
        assert_eq!(BEACON.get().strength, 17);
        registry.fini();
        assert!(!BEACON.node().has_args());
    }

    #[test]
    fn deferred_handles_take_arguments_at_init() {
        static TESTS: crate::boot::Group = crate::boot::Group::new("tests");
        static BEACON: Handle<Beacon> = Handle::deferred("beacon", "tests");

        let registry = Registry::new();
        registry.register_group(&TESTS);
        registry.install(&BEACON);
        registry.link();

        assert!(!BEACON.node().has_args());
        BEACON.init_with(&registry, 31);
        assert_eq!(BEACON.get().strength, 31);
        registry.fini();
    }

    #[test]
    #[should_panic(expected = "no construction arguments")]
    fn deferred_handles_reject_plain_init() {
        static TESTS: crate::boot::Group = crate::boot::Group::new("tests");
        static BEACON: Handle<Beacon> = Handle::deferred("beacon", "tests");

        let registry = Registry::new();
        registry.register_group(&TESTS);
        registry.install(&BEACON);
        registry.link();
        BEACON.init(&registry);
    }

    #[test]
    fn zero_sized_arguments_never_touch_the_heap() {
        static DROPS: AtomicU32 = AtomicU32::new(0);
        static TESTS: crate::boot::Group = crate::boot::Group::new("tests");
        static MARKER: Handle<Marker> = Handle::new("marker", "tests");

        struct Marker;

        impl Subsystem for Marker {
            type Args = ();

            fn create(_: &()) -> Self {
                Marker
            }
        }

        impl Drop for Marker {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let registry = Registry::new();
        registry.register_group(&TESTS);
        registry.install(&MARKER);
        registry.link();

        assert!(!MARKER.node().has_args());
        MARKER.init(&registry);
        assert!(!MARKER.node().has_args());
        registry.fini();
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);
    }
}
