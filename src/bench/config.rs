//! Benchmark configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Immutable run configuration, created once per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Path to a video file or RTSP URL
    pub source: String,
    /// Maximum number of streams to test (default: CPU thread count)
    pub max_streams: Option<u32>,
    /// Target FPS for the real-time threshold (default: native FPS)
    pub target_fps: Option<f64>,
    /// Log file path (default: video-benchmark.log)
    pub log_file: Option<PathBuf>,
    /// CSV export path
    pub csv_file: Option<PathBuf>,
    /// Measurement window per tested stream count, in seconds
    pub measurement_duration: f64,
    /// System CPU usage ceiling, in percent
    pub cpu_threshold: f64,
}

impl BenchmarkConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            max_streams: None,
            target_fps: None,
            log_file: None,
            csv_file: None,
            measurement_duration: 10.0,
            cpu_threshold: 85.0,
        }
    }
}
