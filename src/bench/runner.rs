//! Benchmark runner: one measured run per candidate stream count, plus the
//! binary search that localizes the true capacity after the first failure.

use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::bench::config::BenchmarkConfig;
use crate::bench::result::{BenchmarkResult, StreamTestResult};
use crate::decode::engine::{DecodeEngine, RunPlan};
use crate::decode::StreamFactory;
use crate::error::{BenchError, BenchResult};
use crate::monitor;
use crate::monitor::system::{self, SystemSummary};
use crate::probe::VideoInfo;

// Candidate shaping: powers of two up to this bound, one extra step at 12,
// then linear steps of 4 starting at 20.
const POWER_OF_TWO_MAX: u32 = 16;
const EXTRA_STEP: u32 = 12;
const LINEAR_STEP_START: u32 = 20;
const LINEAR_STEP: u32 = 4;

/// Ordered, de-duplicated stream counts to test up to `max_streams`.
pub fn stream_counts_to_test(max_streams: u32) -> Vec<u32> {
    let mut counts = Vec::new();

    let mut n = 1;
    while n <= POWER_OF_TWO_MAX && n <= max_streams {
        counts.push(n);
        n *= 2;
    }

    if max_streams >= EXTRA_STEP && !counts.contains(&EXTRA_STEP) {
        counts.push(EXTRA_STEP);
    }

    let mut n = LINEAR_STEP_START;
    while n <= max_streams {
        counts.push(n);
        n += LINEAR_STEP;
    }

    if !counts.contains(&max_streams) {
        counts.push(max_streams);
    }

    counts.sort_unstable();
    counts
}

/// Walks the candidate list, then binary-searches the gap between the last
/// passing and first failing count. Every probed result is handed to
/// `observe` in probe order; any probe error aborts the whole search.
/// Returns the greatest passing stream count, or 0.
pub fn search_capacity<E>(
    candidates: &[u32],
    mut probe: impl FnMut(u32) -> Result<StreamTestResult, E>,
    mut observe: impl FnMut(&StreamTestResult),
) -> Result<u32, E> {
    let mut last_passing = 0;

    for &count in candidates {
        let result = probe(count)?;
        let passed = result.passed;
        observe(&result);

        if passed {
            last_passing = count;
            continue;
        }

        // First failure: localize capacity inside the untested gap.
        if last_passing > 0 && count - last_passing > 1 {
            let mut low = last_passing + 1;
            let mut high = count - 1;
            while low <= high {
                let mid = low + (high - low) / 2;
                let mid_result = probe(mid)?;
                let mid_passed = mid_result.passed;
                observe(&mid_result);
                if mid_passed {
                    last_passing = mid;
                    low = mid + 1;
                } else {
                    high = mid - 1;
                }
            }
        }
        break;
    }

    Ok(last_passing)
}

/// Drives a full benchmark over one stream factory.
pub struct Runner<F: StreamFactory> {
    config: BenchmarkConfig,
    video_info: VideoInfo,
    factory: F,
}

impl<F: StreamFactory> Runner<F> {
    pub fn new(config: BenchmarkConfig, video_info: VideoInfo, factory: F) -> Self {
        Self {
            config,
            video_info,
            factory,
        }
    }

    /// Runs the capacity probe. `progress` fires after every completed run,
    /// binary-search probes included.
    pub fn run(&self, progress: &mut dyn FnMut(&StreamTestResult)) -> BenchResult<BenchmarkResult> {
        let system = SystemSummary::gather();
        let target_fps = self.config.target_fps.unwrap_or(self.video_info.fps);
        let max_streams = self
            .config
            .max_streams
            .unwrap_or(system.thread_count as u32)
            .max(1);

        info!(
            "Benchmark start: target {target_fps:.2} fps, up to {max_streams} streams, {}s per run",
            self.config.measurement_duration
        );

        let candidates = stream_counts_to_test(max_streams);
        let mut test_results = Vec::new();

        let max_streams = search_capacity(
            &candidates,
            |count| self.run_single(count, target_fps),
            |result| {
                test_results.push(result.clone());
                progress(result);
            },
        )?;

        Ok(BenchmarkResult {
            system,
            source: self.config.source.clone(),
            video: self.video_info.clone(),
            target_fps,
            test_results,
            max_streams,
        })
    }

    /// One measurement at a fixed stream count: spin up the engine, pace
    /// the measurement window, sample telemetry, tear down, aggregate.
    fn run_single(&self, stream_count: u32, target_fps: f64) -> BenchResult<StreamTestResult> {
        let plan = RunPlan::new(stream_count as usize, system::logical_cpus());
        info!(
            "Testing {stream_count} stream(s): {} mode, {} decoder thread(s)",
            if plan.pooled { "pooled" } else { "direct" },
            plan.decoder_threads
        );

        let mut cpu = monitor::cpu_monitor();
        let memory = monitor::memory_monitor();

        let engine =
            DecodeEngine::launch(&self.factory, &plan, target_fps, self.video_info.is_live)?;

        // Run starts for every worker when the main thread arrives.
        engine.start();
        cpu.start_measurement();
        let run_start = Instant::now();

        thread::sleep(Duration::from_secs_f64(self.config.measurement_duration));

        engine.stop();
        let cpu_usage = cpu.cpu_usage();
        let memory_mb = memory.process_memory_mb();
        let elapsed = run_start.elapsed().as_secs_f64();

        let outcomes = engine.join()?;

        // First per-stream error wins and fails the run.
        if let Some(message) = outcomes.iter().find_map(|outcome| {
            outcome
                .error
                .as_ref()
                .map(|error| format!("Stream {}: {error}", outcome.stream_id))
        }) {
            return Err(BenchError::Run { message });
        }

        for outcome in &outcomes {
            if outcome.lag_count > 0 {
                info!(
                    "Stream {} lagged {} time(s), worst {:.1} ms",
                    outcome.stream_id, outcome.lag_count, outcome.max_lag_ms
                );
            }
        }

        let per_stream_frames: Vec<i64> = outcomes.iter().map(|o| o.frames).collect();
        Ok(StreamTestResult::from_frames(
            stream_count,
            per_stream_frames,
            elapsed,
            cpu_usage,
            memory_mb,
            target_fps,
            self.config.cpu_threshold,
        ))
    }
}
