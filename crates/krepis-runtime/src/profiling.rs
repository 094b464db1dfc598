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

//! Frame timing as a registry-managed global.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use krepis_core::boot::Subsystem;

/// Accumulated frame timing figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    /// Frames recorded so far.
    pub frames: u64,
    /// Sum of all recorded frame durations.
    pub total: Duration,
    /// The slowest recorded frame.
    pub worst: Duration,
}

impl FrameStats {
    /// Mean frame duration, or zero before the first frame.
    pub fn average(&self) -> Duration {
        if self.frames == 0 {
            Duration::ZERO
        } else {
            self.total / self.frames as u32
        }
    }
}

/// Collects per-frame durations for the lifetime of the process.
pub struct FrameProfiler {
    stats: Mutex<FrameStats>,
}

impl Subsystem for FrameProfiler {
    type Args = ();

    fn create(_: &()) -> Self {
        FrameProfiler {
            stats: Mutex::new(FrameStats::default()),
        }
    }
}

impl FrameProfiler {
    /// Folds one frame duration into the running figures.
    pub fn record(&self, elapsed: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.frames += 1;
        stats.total += elapsed;
        if elapsed > stats.worst {
            stats.worst = elapsed;
        }
    }

    /// Starts timing a frame; the sample records itself when dropped.
    pub fn sample(&self) -> ScopedSample<'_> {
        ScopedSample {
            profiler: self,
            started: Instant::now(),
        }
    }

    /// A copy of the current figures.
    pub fn stats(&self) -> FrameStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for FrameProfiler {
    fn drop(&mut self) {
        let stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        log::info!(
            "profiler offline: {} frames, average {:?}, worst {:?}",
            stats.frames,
            stats.average(),
            stats.worst
        );
    }
}

/// Times one scope and records it into the profiler on drop, so the
/// measurement lands even on early returns.
pub struct ScopedSample<'a> {
    profiler: &'a FrameProfiler,
    started: Instant,
}

impl Drop for ScopedSample<'_> {
    fn drop(&mut self) {
        self.profiler.record(self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_averages() {
        let profiler = FrameProfiler::create(&());
        profiler.record(Duration::from_millis(10));
        profiler.record(Duration::from_millis(30));

        let stats = profiler.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.total, Duration::from_millis(40));
        assert_eq!(stats.worst, Duration::from_millis(30));
        assert_eq!(stats.average(), Duration::from_millis(20));
    }

    #[test]
    fn scoped_sample_records_on_drop() {
        let profiler = FrameProfiler::create(&());
        {
            let _sample = profiler.sample();
        }
        assert_eq!(profiler.stats().frames, 1);
    }

    #[test]
    fn empty_profiler_averages_to_zero() {
        let profiler = FrameProfiler::create(&());
        assert_eq!(profiler.stats().average(), Duration::ZERO);
    }
}
