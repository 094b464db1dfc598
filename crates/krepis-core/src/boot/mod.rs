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

//! # Deferred global initialization
//!
//! Long-lived applications accumulate process-wide singletons: an
//! allocator, a logger, a worker pool, a profiler. They must come up in a
//! dependency-respecting order and go down in exactly the reverse of the
//! order they actually came up in, and no language gives that ordering
//! away for free across compilation units.
//!
//! This module separates *declaring* a global from *constructing* it:
//!
//! - A [`Handle`] declares one global as a `static`: a name, a group
//!   name, optional construction arguments, and inline storage for the
//!   value. Nothing is constructed yet.
//! - A [`Group`] names a startup phase; globals reference it by name only.
//! - A [`Registry`] collects handles and groups, resolves the names once
//!   at [`link`](Registry::link), constructs everything in group order at
//!   [`init`](Registry::init), and tears everything down in the exact
//!   reverse of the *observed* construction order at
//!   [`fini`](Registry::fini).
//!
//! Partial bring-up is first-class: [`Registry::find`] fetches one group
//! so a binary can raise, say, its logger before the full sweep, and the
//! chronological teardown record keeps shutdown correct anyway.
//!
//! The machinery underneath is deliberately allocation-free until a
//! handle carries arguments: nodes chain through intrusive lists embedded
//! in themselves, node flags ride the spare alignment bits of
//! the argument-block pointer ([`TaggedPtr`]), and a single function
//! pointer per wrapped type erases it behind a fixed-size [`Node`].

mod group;
mod handle;
mod list;
mod node;
mod registry;
mod spin;
mod tagged;

pub use group::Group;
pub use handle::{Handle, Subsystem};
pub use node::Node;
pub use registry::Registry;
pub use spin::{SpinGuard, SpinLock};
pub use tagged::TaggedPtr;
