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

//! The process logger as a registry-managed global.
//!
//! Wrapping `env_logger` installation in a subsystem lets a binary raise
//! logging through a partial `platform` pass before the full bring-up
//! sweep, so every later lifecycle event is observable.

use env_logger::{Builder, Env};
use krepis_core::boot::Subsystem;

/// Construction parameters for [`LogSink`].
#[derive(Debug, Clone, Copy)]
pub struct LogArgs {
    /// Default filter when `RUST_LOG` is not set, e.g. `"info"`.
    pub filter: &'static str,
}

/// Installs the global `env_logger` backend on creation.
///
/// The `log` facade allows exactly one backend per process; if another one
/// beat us to it (tests, embedding hosts) this records that and stays
/// inert. There is no uninstall, so teardown is a no-op.
pub struct LogSink {
    filter: &'static str,
    installed: bool,
}

impl Subsystem for LogSink {
    type Args = LogArgs;

    fn create(args: &LogArgs) -> Self {
        let installed = Builder::from_env(Env::default().default_filter_or(args.filter))
            .try_init()
            .is_ok();
        if installed {
            log::debug!("process logger online (default filter `{}`)", args.filter);
        }
        LogSink {
            filter: args.filter,
            installed,
        }
    }
}

impl LogSink {
    /// The default filter this sink was declared with.
    pub fn filter(&self) -> &'static str {
        self.filter
    }

    /// Whether this sink actually owns the process logger.
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_installation_stays_inert() {
        let first = LogSink::create(&LogArgs { filter: "debug" });
        let second = LogSink::create(&LogArgs { filter: "trace" });
        assert_eq!(first.filter(), "debug");
        assert_eq!(second.filter(), "trace");
        // Only one backend can own the process.
        assert!(first.is_installed());
        assert!(!second.is_installed());
    }
}
