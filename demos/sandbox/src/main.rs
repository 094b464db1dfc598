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

// Krepis sandbox
// Demonstrates the whole lifecycle: declare, link, staged bring-up,
// runtime-sized pool, full sweep, workload, ordered teardown.

use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use krepis_core::boot::Registry;
use krepis_core::memory;
use krepis_runtime::{install_defaults, WorkerPoolArgs, LOG, PROFILER, WORKERS};

const FRAMES: u64 = 3;
const TASKS_PER_FRAME: u64 = 8;

/// A stand-in workload: a small deterministic checksum.
fn churn(frame: u64, task: u64) -> u64 {
    let mut acc = frame.wrapping_mul(31).wrapping_add(task.wrapping_mul(17));
    for round in 0..10_000u64 {
        acc = acc.rotate_left(7) ^ round;
    }
    acc
}

fn main() -> Result<()> {
    let registry = Registry::global();
    install_defaults(registry);
    registry.link();

    // Logging first: the platform group comes up before anything else so
    // the rest of the bring-up is observable.
    registry
        .find("platform")
        .context("platform group is not registered")?
        .init(registry);
    log::info!("platform online (default filter `{}`)", LOG.get().filter());

    // The pool size is only known now; rebuild its arguments and bring it
    // up ahead of the sweep.
    let threads = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    WORKERS.init_with(registry, WorkerPoolArgs { threads });

    // Everything else in declaration order.
    registry.init();

    let (done, results) = mpsc::channel::<u64>();
    for frame in 0..FRAMES {
        let _sample = PROFILER.sample();
        for task in 0..TASKS_PER_FRAME {
            let done = done.clone();
            WORKERS.execute(move || {
                let _ = done.send(churn(frame, task));
            });
        }
    }
    drop(done);

    let checksum = results.iter().fold(0u64, |acc, value| acc ^ value);
    log::info!(
        "workload complete: {} tasks, checksum {checksum:#018x}",
        FRAMES * TASKS_PER_FRAME
    );

    let frame_stats = PROFILER.stats();
    log::info!(
        "frames: {}, average {:?}, worst {:?}",
        frame_stats.frames,
        frame_stats.average(),
        frame_stats.worst
    );

    let block_stats = memory::bootstrap_stats();
    log::info!(
        "argument blocks: {} allocated, {} freed, {} live",
        block_stats.blocks_allocated,
        block_stats.blocks_freed,
        block_stats.live_blocks
    );

    // Reverse of the observed bring-up order: profiler, workers, logger.
    registry.fini();
    Ok(())
}
