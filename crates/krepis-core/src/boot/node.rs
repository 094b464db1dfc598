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

//! Per-global bookkeeping record.
//!
//! A [`Node`] is the fixed-size, type-erased face of one registered global.
//! It knows the global's name, the name of the group it was declared
//! against, and a single dispatch function that performs every typed
//! operation on the value living behind it. Because all type knowledge sits
//! behind that one function pointer, every `Node` has the same size no
//! matter what it fronts, and the registry can chain them through
//! homogeneous intrusive lists.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::boot::list::{OrderLink, XorLink};
use crate::boot::registry::Registry;
use crate::boot::tagged::TaggedPtr;

/// Opaque header every heap argument block starts with. Its alignment
/// frees three pointer bits for the node state flags.
#[repr(align(8))]
pub(crate) struct ArgHeader {
    _opaque: [u8; 0],
}

/// Flag bits stored in the tag of the argument-block pointer.
pub(crate) mod flags {
    /// The node participates in sweeps.
    pub const ENABLED: usize = 1 << 0;
    /// The wrapped value currently exists.
    pub const INITIALIZED: usize = 1 << 1;
    /// A heap argument block is attached.
    pub const HAS_ARGS: usize = 1 << 2;
}

/// Operation selector passed to a node's dispatch function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOp {
    /// Construct the wrapped value into the handle's storage.
    ConstructValue,
    /// Drop the wrapped value in place.
    DestructValue,
    /// Drop the argument block and return it to the bootstrap allocator.
    DestructArguments,
}

/// The single type-erased entry point of a node. One instance exists per
/// concrete wrapped type; it recovers the typed handle from the node
/// address alone.
pub(crate) type DispatchFn = unsafe fn(DispatchOp, &Node);

/// Bookkeeping record for one registered global.
///
/// Created in "declared" state by a [`Handle`](crate::boot::Handle), moved
/// into its group by [`Registry::link`], flipped to initialized and back by
/// [`init`](Node::init) / [`fini`](Node::fini). The node itself is never
/// deallocated; only its optional argument block is, once, at `fini`.
pub struct Node {
    name: &'static str,
    group: &'static str,
    dispatch: DispatchFn,
    /// Argument-block pointer plus the `flags` bits, as one tagged word.
    state: AtomicUsize,
    /// Membership in the registry's pre-link bucket.
    pub(crate) bucket_link: XorLink,
    /// Membership in the owning group, assigned at link time.
    pub(crate) member_link: XorLink,
    /// Position in the chronological initialization record.
    pub(crate) order_link: OrderLink,
}

impl Node {
    pub(crate) const fn new(name: &'static str, group: &'static str, dispatch: DispatchFn) -> Self {
        Self {
            name,
            group,
            dispatch,
            state: AtomicUsize::new(TaggedPtr::<ArgHeader>::null(flags::ENABLED).to_bits()),
            bucket_link: XorLink::new(),
            member_link: XorLink::new(),
            order_link: OrderLink::new(),
        }
    }

    /// The global's own name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The name of the group this global was declared against.
    pub fn group_name(&self) -> &'static str {
        self.group
    }

    /// Whether sweeps will pick this node up.
    pub fn is_enabled(&self) -> bool {
        self.state().tag() & flags::ENABLED != 0
    }

    /// Whether the wrapped value currently exists.
    pub fn is_initialized(&self) -> bool {
        self.state().tag() & flags::INITIALIZED != 0
    }

    /// Whether a heap argument block is currently attached.
    pub fn has_args(&self) -> bool {
        self.state().tag() & flags::HAS_ARGS != 0
    }

    /// Includes or excludes this node from group and registry sweeps.
    /// Direct [`init`](Node::init) of a disabled node is a fatal error.
    pub fn set_enabled(&self, enabled: bool) {
        let state = self.state();
        let tag = if enabled {
            state.tag() | flags::ENABLED
        } else {
            state.tag() & !flags::ENABLED
        };
        self.set_state(state.retag(tag));
    }

    /// Constructs the wrapped value and records this node on the
    /// registry's chronological initialization list.
    ///
    /// # Panics
    ///
    /// Panics if the node is disabled or already initialized. Both are
    /// ordering bugs in the caller; there is no recovery.
    pub fn init(&'static self, registry: &Registry) {
        let state = self.state();
        assert!(
            state.tag() & flags::ENABLED != 0,
            "global `{}` is disabled and cannot be initialized",
            self.name
        );
        assert!(
            state.tag() & flags::INITIALIZED == 0,
            "global `{}` was initialized twice",
            self.name
        );
        // SAFETY: the dispatch function was monomorphised for the handle
        // this node is embedded in, and bring-up runs on one thread.
        unsafe { (self.dispatch)(DispatchOp::ConstructValue, self) };
        self.set_state(state.retag(state.tag() | flags::INITIALIZED));
        registry.record_init(self);
        log::trace!("initialized global `{}` (group `{}`)", self.name, self.group);
    }

    /// Destroys the wrapped value, frees the argument block if one is
    /// attached, and forgets this node's chronological record.
    ///
    /// # Panics
    ///
    /// Panics if the node is not currently initialized.
    pub fn fini(&'static self, registry: &Registry) {
        let state = self.state();
        assert!(
            state.tag() & flags::INITIALIZED != 0,
            "global `{}` was finalized before initialization",
            self.name
        );
        // SAFETY: as in `init`; the initialized flag checked above means
        // the slot holds a live value for DestructValue to drop.
        unsafe { (self.dispatch)(DispatchOp::DestructValue, self) };
        let tag = state.tag() & !flags::INITIALIZED;
        if tag & flags::HAS_ARGS != 0 {
            // SAFETY: a set HAS_ARGS flag means the tagged pointer holds
            // the block the owning handle allocated.
            unsafe { (self.dispatch)(DispatchOp::DestructArguments, self) };
            self.set_state(TaggedPtr::null(tag & !flags::HAS_ARGS));
        } else {
            self.set_state(state.retag(tag));
        }
        registry.forget_init(self);
        log::trace!("finalized global `{}` (group `{}`)", self.name, self.group);
    }

    pub(crate) fn state(&self) -> TaggedPtr<ArgHeader> {
        TaggedPtr::from_bits(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: TaggedPtr<ArgHeader>) {
        self.state.store(state.to_bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn inert(_: DispatchOp, _: &Node) {}

    #[test]
    fn starts_enabled_and_uninitialized() {
        static NODE: Node = Node::new("probe", "tests", inert);
        assert!(NODE.is_enabled());
        assert!(!NODE.is_initialized());
        assert!(!NODE.has_args());
        assert_eq!(NODE.name(), "probe");
        assert_eq!(NODE.group_name(), "tests");
    }

    #[test]
    fn enable_toggle_leaves_other_flags_alone() {
        static NODE: Node = Node::new("probe", "tests", inert);
        NODE.set_enabled(false);
        assert!(!NODE.is_enabled());
        assert!(!NODE.is_initialized());
        NODE.set_enabled(true);
        assert!(NODE.is_enabled());
    }
}
