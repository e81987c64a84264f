//! User-facing output: console formatting and CSV export.

pub mod csv;

use tracing::{error, info};

use crate::bench::result::{BenchmarkResult, StreamTestResult};
use crate::monitor::system::SystemSummary;
use crate::probe::VideoInfo;

/// Prints to stdout and mirrors the same line to the log file.
fn info_line(line: &str) {
    println!("{line}");
    info!("{line}");
}

pub fn print_header(system: &SystemSummary, video: &VideoInfo, source: &str) {
    info_line(&format!(
        "CPU: {} ({} threads)",
        system.cpu_name, system.thread_count
    ));
    info_line(&format!(
        "{}{}",
        if video.is_live { "Source: " } else { "File: " },
        source
    ));
    info_line(&format!(
        "{}{} {}, {}fps{}",
        if video.is_live { "Source: " } else { "Video: " },
        video.resolution_label(),
        video.codec_name(),
        video.fps as i64,
        if video.is_live { " (live)" } else { "" }
    ));
    println!();
}

pub fn print_testing_start() {
    info_line("Testing...");
}

/// One line per completed run:
/// ` N stream(s):  XXfps (min:m/avg:a/max:M) (CPU: c%) ✓|✗[ reason]`
pub fn print_test_result(result: &StreamTestResult) {
    let stream_word = if result.stream_count == 1 {
        "stream: "
    } else {
        "streams:"
    };

    let mut line = format!(
        "{:>2} {} {:>5}fps (min:{}/avg:{}/max:{}) (CPU: {:>2}%) {}",
        result.stream_count,
        stream_word,
        result.avg_fps as i64,
        result.min_fps as i64,
        result.avg_fps as i64,
        result.max_fps as i64,
        result.cpu_usage as i64,
        result.status_symbol()
    );
    if let Some(reason) = result.failure_reason() {
        line.push(' ');
        line.push_str(reason);
    }
    info_line(&line);

    // Per-stream detail goes to the log file only.
    info!(
        "  decoded frames per stream: {:?}",
        result.per_stream_frames
    );
}

pub fn print_summary(result: &BenchmarkResult) {
    println!();
    if result.max_streams > 0 {
        info_line(&format!(
            "Result: Maximum {} concurrent stream{} can be decoded in real-time",
            result.max_streams,
            if result.max_streams == 1 { "" } else { "s" }
        ));
    } else {
        info_line("Result: Could not achieve real-time decoding even with 1 stream");
    }
}

/// Error line to stderr, mirrored to the log.
pub fn print_error(message: &str) {
    let line = format!("Error: {message}");
    eprintln!("{line}");
    error!("{line}");
}
