//! Command implementation: the full benchmark flow.

use std::path::Path;

use tracing::info;

use crate::bench::config::BenchmarkConfig;
use crate::bench::runner::Runner;
use crate::cli::Cli;
use crate::decode::libav::LibavFactory;
use crate::error::{BenchError, BenchResult};
use crate::{output, probe};

/// Probes the source, runs the capacity benchmark, prints and exports the
/// results. Returns an error for any configuration, probe, or run failure.
pub fn benchmark(cli: Cli) -> BenchResult<()> {
    if !probe::is_live_source(&cli.video_source) && !Path::new(&cli.video_source).exists() {
        return Err(BenchError::Config {
            message: format!("File not found: {}", cli.video_source),
        });
    }

    crate::init()?;

    let video_info = probe::analyze(&cli.video_source)?;
    if !video_info.codec.is_supported() {
        return Err(BenchError::Probe {
            message: format!("Unsupported codec: {}", video_info.codec_name()),
        });
    }

    let config = BenchmarkConfig {
        max_streams: cli.max_streams,
        target_fps: cli.target_fps,
        log_file: cli.log_file,
        csv_file: cli.csv_file,
        ..BenchmarkConfig::new(cli.video_source)
    };

    let system = crate::monitor::system::SystemSummary::gather();
    output::print_header(&system, &video_info, &config.source);
    output::print_testing_start();

    let factory = LibavFactory::new(config.source.clone(), video_info.is_live);
    let runner = Runner::new(config.clone(), video_info, factory);
    let result = runner.run(&mut output::print_test_result)?;

    output::print_summary(&result);

    if let Some(path) = &config.csv_file {
        output::csv::export(&result, path)?;
        info!("CSV results exported to: {}", path.display());
    }

    Ok(())
}
