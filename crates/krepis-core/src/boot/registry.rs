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

//! The registry: where declared globals meet their groups.
//!
//! A [`Registry`] goes through four phases, driven by one orchestrating
//! thread:
//!
//! 1. **Registration**: groups and globals arrive through
//!    [`register_group`](Registry::register_group),
//!    [`register`](Registry::register) and
//!    [`install`](Registry::install), possibly from several threads at
//!    once; a spin lock is the only synchronization required.
//! 2. **[`link`](Registry::link)**, exactly once: every declared global is
//!    moved from the pre-link bucket into the group it names. A global
//!    naming an unknown group is a fatal configuration error.
//! 3. **[`init`](Registry::init)**: groups are swept in registration
//!    order. [`find`](Registry::find) supports partial bring-up of
//!    specific groups before the full sweep.
//! 4. **[`fini`](Registry::fini)**: teardown in the exact reverse of the
//!    *observed* initialization order, which the registry records as each
//!    node comes up. This holds even when a partial pass initialized a
//!    later-declared group's member first.
//!
//! Production binaries normally use the process-wide instance behind
//! [`Registry::global`]; tests build their own instances.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::boot::group::Group;
use crate::boot::handle::{Handle, Subsystem};
use crate::boot::list::{OrderAdapter, OrderList, XorAdapter, XorList};
use crate::boot::node::Node;
use crate::boot::spin::SpinLock;

struct BucketChain;

impl XorAdapter for BucketChain {
    type Item = Node;

    fn link(item: &Node) -> &crate::boot::list::XorLink {
        &item.bucket_link
    }
}

struct RosterChain;

impl XorAdapter for RosterChain {
    type Item = Group;

    fn link(item: &Group) -> &crate::boot::list::XorLink {
        &item.roster_link
    }
}

struct OrderChain;

impl OrderAdapter for OrderChain {
    type Item = Node;

    fn link(item: &Node) -> &crate::boot::list::OrderLink {
        &item.order_link
    }
}

static GLOBAL: Registry = Registry::new();

/// Process-wide bookkeeping for deferred global initialization.
pub struct Registry {
    lock: SpinLock,
    /// Declared globals that have not been linked into a group yet.
    bucket: XorList<BucketChain>,
    /// Every registered group, in registration order.
    roster: XorList<RosterChain>,
    /// Chronological record of successful initializations.
    order: OrderList<OrderChain>,
    linked: AtomicBool,
}

impl Registry {
    /// An empty registry. Const, so it can back a `static`.
    pub const fn new() -> Self {
        Self {
            lock: SpinLock::new(),
            bucket: XorList::new(),
            roster: XorList::new(),
            order: OrderList::new(),
            linked: AtomicBool::new(false),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Declares a global. Safe to call concurrently with other
    /// registrations.
    ///
    /// # Panics
    ///
    /// Panics if [`link`](Registry::link) has already run.
    pub fn register(&self, node: &'static Node) {
        let _guard = self.lock.lock();
        assert!(
            !self.linked.load(Ordering::Relaxed),
            "global `{}` was registered after link",
            node.name()
        );
        self.bucket.push(node);
        log::trace!(
            "declared global `{}` (group `{}`)",
            node.name(),
            node.group_name()
        );
    }

    /// Declares a group. Safe to call concurrently with other
    /// registrations.
    ///
    /// # Panics
    ///
    /// Panics if [`link`](Registry::link) has already run.
    pub fn register_group(&self, group: &'static Group) {
        let _guard = self.lock.lock();
        assert!(
            !self.linked.load(Ordering::Relaxed),
            "group `{}` was registered after link",
            group.name()
        );
        self.roster.push(group);
        log::trace!("declared group `{}`", group.name());
    }

    /// Declares a handle-wrapped global: materializes its declaration
    /// arguments into a heap block, then registers its node.
    pub fn install<T: Subsystem>(&self, handle: &'static Handle<T>) {
        handle.materialize_seed();
        self.register(handle.node());
    }

    /// Resolves every declared global into the group it names. One shot;
    /// after this the pre-link bucket is empty and every node belongs to
    /// exactly one group.
    ///
    /// # Panics
    ///
    /// Panics listing every global whose declared group was never
    /// registered: running on with orphaned globals is never safe. Also
    /// panics if called twice.
    pub fn link(&self) {
        let _guard = self.lock.lock();
        assert!(
            !self.linked.swap(true, Ordering::Relaxed),
            "the registry may only be linked once"
        );
        let mut orphans: Vec<String> = Vec::new();
        let mut linked = 0usize;
        for node in self.bucket.iter() {
            match self.roster.iter().find(|g| g.name() == node.group_name()) {
                Some(group) => {
                    group.adopt(node);
                    linked += 1;
                }
                None => orphans.push(format!("`{}` (group `{}`)", node.name(), node.group_name())),
            }
        }
        if !orphans.is_empty() {
            panic!(
                "globals were declared against unknown groups: {}",
                orphans.join(", ")
            );
        }
        self.bucket.clear();
        debug_assert!(self.bucket.is_empty());
        log::debug!("linked {linked} globals");
    }

    /// Brings up every group in registration order. Nodes already
    /// initialized by a partial pass, and disabled nodes, are skipped.
    ///
    /// # Panics
    ///
    /// Panics if called before [`link`](Registry::link).
    pub fn init(&self) {
        assert!(
            self.linked.load(Ordering::Relaxed),
            "the registry must be linked before the bring-up sweep"
        );
        log::debug!("global bring-up sweep");
        for group in self.roster.iter() {
            group.init(self);
        }
    }

    /// Tears everything down in the exact reverse of the observed
    /// initialization order, regardless of group boundaries.
    pub fn fini(&self) {
        log::debug!("global teardown sweep");
        while let Some(node) = self.order.back() {
            node.fini(self);
        }
    }

    /// Looks a group up by name, for partial bring-up or teardown of a
    /// specific phase.
    pub fn find(&self, name: &str) -> Option<&'static Group> {
        self.roster.iter().find(|group| group.name() == name)
    }

    /// Whether [`link`](Registry::link) has run.
    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Relaxed)
    }

    pub(crate) fn record_init(&self, node: &'static Node) {
        self.order.push(node);
    }

    pub(crate) fn forget_init(&self, node: &'static Node) {
        self.order.remove(node);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::node::DispatchOp;

    unsafe fn inert(_: DispatchOp, _: &Node) {}

    #[test]
    fn link_empties_the_bucket_into_groups() {
        static SYSTEM: Group = Group::new("system");
        static ALLOC: Node = Node::new("alloc", "system", inert);
        static LOGGER: Node = Node::new("logger", "system", inert);

        let registry = Registry::new();
        registry.register_group(&SYSTEM);
        registry.register(&ALLOC);
        registry.register(&LOGGER);
        assert!(!registry.bucket.is_empty());

        registry.link();
        assert!(registry.bucket.is_empty());
        assert!(registry.is_linked());
        assert_eq!(SYSTEM.find("alloc").map(Node::name), Some("alloc"));
        assert_eq!(SYSTEM.find("logger").map(Node::name), Some("logger"));
    }

    #[test]
    #[should_panic(expected = "unknown groups: `orphan` (group `missing`)")]
    fn link_reports_unresolved_groups() {
        static SYSTEM: Group = Group::new("system");
        static ORPHAN: Node = Node::new("orphan", "missing", inert);

        let registry = Registry::new();
        registry.register_group(&SYSTEM);
        registry.register(&ORPHAN);
        registry.link();
    }

    #[test]
    #[should_panic(expected = "only be linked once")]
    fn link_is_one_shot() {
        let registry = Registry::new();
        registry.link();
        registry.link();
    }

    #[test]
    #[should_panic(expected = "registered after link")]
    fn registration_closes_at_link() {
        static LATE: Node = Node::new("late", "system", inert);

        let registry = Registry::new();
        registry.link();
        registry.register(&LATE);
    }

    #[test]
    #[should_panic(expected = "linked before the bring-up sweep")]
    fn init_requires_link() {
        let registry = Registry::new();
        registry.init();
    }

    #[test]
    fn find_locates_groups_by_name() {
        static SYSTEM: Group = Group::new("system");
        static RUNTIME: Group = Group::new("runtime");

        let registry = Registry::new();
        registry.register_group(&SYSTEM);
        registry.register_group(&RUNTIME);

        assert_eq!(registry.find("runtime").map(Group::name), Some("runtime"));
        assert!(registry.find("absent").is_none());
    }
}
