//! Benchmark orchestration: configuration, per-run results, and the
//! capacity probe that drives successive stream counts.

pub mod config;
pub mod result;
pub mod runner;

pub use config::BenchmarkConfig;
pub use result::{BenchmarkResult, StreamTestResult};
pub use runner::Runner;
