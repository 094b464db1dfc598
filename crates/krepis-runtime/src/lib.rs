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

//! Concrete registry-managed subsystems and the standard bring-up layout.
//!
//! Two phases cover the usual dependency shape of a native application:
//!
//! - `platform`: must exist before anything else says a word. Holds the
//!   process logger.
//! - `runtime`: the working machinery. Holds the worker pool and the
//!   frame profiler.
//!
//! A binary calls [`install_defaults`], links, raises `platform` through
//! `Registry::find`, sizes the pool with `Handle::init_with`, and then
//! runs the full sweep; see `demos/sandbox`.

pub mod logging;
pub mod profiling;
pub mod workers;

pub use logging::{LogArgs, LogSink};
pub use profiling::{FrameProfiler, FrameStats, ScopedSample};
pub use workers::{WorkerPool, WorkerPoolArgs};

use krepis_core::boot::{Group, Handle, Registry};

/// Globals that must exist before anything else says a word.
pub static PLATFORM: Group = Group::new("platform");

/// The working machinery of the process.
pub static RUNTIME: Group = Group::new("runtime");

/// The process logger.
pub static LOG: Handle<LogSink> = Handle::with_args("log", "platform", LogArgs { filter: "info" });

/// The shared worker pool. The declared size is a fallback; binaries
/// normally override it with `init_with` once they know the machine.
pub static WORKERS: Handle<WorkerPool> =
    Handle::with_args("workers", "runtime", WorkerPoolArgs { threads: 4 });

/// The frame profiler.
pub static PROFILER: Handle<FrameProfiler> = Handle::new("profiler", "runtime");

/// Registers the standard groups and globals into `registry`.
pub fn install_defaults(registry: &Registry) {
    registry.register_group(&PLATFORM);
    registry.register_group(&RUNTIME);
    registry.install(&LOG);
    registry.install(&WORKERS);
    registry.install(&PROFILER);
}
