//! Benchmark result types.

use serde::{Deserialize, Serialize};

use crate::monitor::system::SystemSummary;
use crate::probe::VideoInfo;

/// Tolerance applied to the target FPS when judging per-stream minimums;
/// absorbs scheduling jitter in real-time paced decoding.
pub const FPS_TOLERANCE: f64 = 0.98;

/// Result of testing one stream count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamTestResult {
    pub stream_count: u32,
    /// Average FPS across all streams
    pub avg_fps: f64,
    /// Minimum FPS among all streams
    pub min_fps: f64,
    /// Maximum FPS among all streams
    pub max_fps: f64,
    /// FPS for each individual stream
    pub per_stream_fps: Vec<f64>,
    /// Decoded frame count for each stream
    pub per_stream_frames: Vec<i64>,
    /// Average system CPU usage over the measurement window, percent
    pub cpu_usage: f64,
    /// Process RSS at the end of the window, MB
    pub memory_mb: u64,
    pub fps_passed: bool,
    pub cpu_passed: bool,
    pub passed: bool,
}

impl StreamTestResult {
    /// Derives a result from raw per-stream frame counts. The FPS check
    /// judges the slowest stream against `target_fps × 0.98`; the CPU check
    /// passes when usage is at or below the threshold.
    pub fn from_frames(
        stream_count: u32,
        per_stream_frames: Vec<i64>,
        elapsed: f64,
        cpu_usage: f64,
        memory_mb: u64,
        target_fps: f64,
        cpu_threshold: f64,
    ) -> Self {
        let per_stream_fps: Vec<f64> = per_stream_frames
            .iter()
            .map(|&frames| if elapsed > 0.0 { frames as f64 / elapsed } else { 0.0 })
            .collect();

        let min_fps = per_stream_fps.iter().copied().fold(f64::INFINITY, f64::min);
        let min_fps = if min_fps.is_finite() { min_fps } else { 0.0 };
        let max_fps = per_stream_fps.iter().copied().fold(0.0, f64::max);
        let avg_fps = if per_stream_fps.is_empty() {
            0.0
        } else {
            per_stream_fps.iter().sum::<f64>() / per_stream_fps.len() as f64
        };

        let fps_passed = min_fps >= target_fps * FPS_TOLERANCE;
        let cpu_passed = cpu_usage <= cpu_threshold;

        Self {
            stream_count,
            avg_fps,
            min_fps,
            max_fps,
            per_stream_fps,
            per_stream_frames,
            cpu_usage,
            memory_mb,
            fps_passed,
            cpu_passed,
            passed: fps_passed && cpu_passed,
        }
    }

    pub fn status_symbol(&self) -> &'static str {
        if self.passed {
            "✓"
        } else {
            "✗"
        }
    }

    pub fn failure_reason(&self) -> Option<&'static str> {
        if self.passed {
            None
        } else if !self.fps_passed {
            Some("FPS below target")
        } else {
            Some("CPU threshold exceeded")
        }
    }
}

/// Final output of a complete benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub system: SystemSummary,
    pub source: String,
    pub video: VideoInfo,
    /// Target FPS the runs were paced against
    pub target_fps: f64,
    /// One entry per tested stream count, in probe order
    pub test_results: Vec<StreamTestResult>,
    /// Greatest tested stream count that passed, or 0
    pub max_streams: u32,
}
