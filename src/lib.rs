//! streambench - concurrent video decode capacity benchmark
//!
//! Measures the maximum number of video streams a machine can decode in
//! real time. Each run spawns N parallel decode pipelines over the same
//! source, paces every pipeline to the target frame rate, and checks that
//! all pipelines held the rate while system CPU stayed under a threshold.
//! A shaped candidate sequence plus a binary search localizes the largest
//! passing N.
//!
//! # Usage
//!
//! ```bash
//! streambench video.mp4
//! streambench --max-streams 8 --target-fps 30 video.mp4
//! streambench --csv-file results.csv rtsp://camera.local/stream
//! ```

pub mod bench;
pub mod cli;
pub mod decode;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod output;
pub mod probe;

pub use bench::config::BenchmarkConfig;
pub use bench::result::{BenchmarkResult, StreamTestResult};
pub use error::{BenchError, BenchResult, StreamError};
pub use probe::{VideoCodec, VideoInfo};

/// Registers FFmpeg components. Call once at startup, before probing or
/// opening any source.
pub fn init() -> BenchResult<()> {
    ffmpeg_next::init().map_err(BenchError::Ffmpeg)
}
