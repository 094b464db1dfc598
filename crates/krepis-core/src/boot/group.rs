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

//! Named, ordered collections of nodes sharing a startup phase.

use crate::boot::list::{XorAdapter, XorList};
use crate::boot::node::Node;
use crate::boot::registry::Registry;

pub(crate) struct MemberChain;

impl XorAdapter for MemberChain {
    type Item = Node;

    fn link(item: &Node) -> &crate::boot::list::XorLink {
        &item.member_link
    }
}

/// A named set of globals brought up together and torn down together.
///
/// Membership is resolved once, at [`Registry::link`] time, from the group
/// names the globals were declared against, and never shrinks afterwards.
/// Within one group, teardown through [`fini`](Group::fini) is the exact
/// reverse of declaration order.
pub struct Group {
    name: &'static str,
    members: XorList<MemberChain>,
    /// Membership in the registry's group roster.
    pub(crate) roster_link: crate::boot::list::XorLink,
}

impl Group {
    /// Declares an empty group. Const, so groups can live in statics and
    /// be registered before any allocator exists.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            members: XorList::new(),
            roster_link: crate::boot::list::XorLink::new(),
        }
    }

    /// The group's name, as globals declare it.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True until the first node is linked in.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Looks a member up by name. A linear scan: groups hold tens of
    /// members, not thousands, and stay cache-resident.
    pub fn find(&self, name: &str) -> Option<&'static Node> {
        self.members.iter().find(|node| node.name() == name)
    }

    /// Brings up every enabled member, head to tail. Members already
    /// initialized by an earlier partial pass are left alone.
    pub fn init(&self, registry: &Registry) {
        log::debug!("bringing up group `{}`", self.name);
        for node in self.members.iter() {
            if node.is_enabled() && !node.is_initialized() {
                node.init(registry);
            }
        }
    }

    /// Tears down every initialized member, tail to head: the exact
    /// reverse of declaration order within this group.
    pub fn fini(&self, registry: &Registry) {
        log::debug!("tearing down group `{}`", self.name);
        for node in self.members.iter_rev() {
            if node.is_initialized() {
                node.fini(registry);
            }
        }
    }

    pub(crate) fn adopt(&self, node: &'static Node) {
        self.members.push(node);
    }
}
