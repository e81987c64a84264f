//! CSV export of per-run results.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::bench::result::BenchmarkResult;
use crate::error::{BenchError, BenchResult};

const HEADER: &str =
    "stream_count,avg_fps,min_fps,max_fps,cpu_usage,memory_mb,fps_passed,cpu_passed,passed";

/// Writes one header line plus one row per tested stream count.
pub fn export(result: &BenchmarkResult, path: &Path) -> BenchResult<()> {
    let mut body = String::with_capacity(256);
    body.push_str(HEADER);
    body.push('\n');

    for test in &result.test_results {
        let _ = writeln!(
            body,
            "{},{},{},{},{},{},{},{},{}",
            test.stream_count,
            test.avg_fps,
            test.min_fps,
            test.max_fps,
            test.cpu_usage,
            test.memory_mb,
            test.fps_passed,
            test.cpu_passed,
            test.passed
        );
    }

    fs::write(path, body).map_err(|e| BenchError::Csv(format!("{}: {e}", path.display())))
}
