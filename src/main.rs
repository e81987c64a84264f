//! streambench binary entry point.

use clap::Parser;
use tracing::info;

use streambench::cli::{commands, Cli};
use streambench::{logging, output};

fn main() {
    let cli = Cli::parse();

    // Logger first so every console line can be mirrored. A failure here
    // degrades to a warning; the benchmark itself does not need the file.
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(logging::default_log_file);
    match logging::init(&log_path) {
        Ok(()) => {
            info!("Log file: {}", log_path.display());
            let cmdline: Vec<String> = std::env::args().collect();
            info!("Command: {}", cmdline.join(" "));
        }
        Err(error) => {
            eprintln!(
                "Warning: Failed to initialize log file '{}': {error}",
                log_path.display()
            );
        }
    }

    if let Err(error) = commands::benchmark(cli) {
        output::print_error(&error.to_string());
        std::process::exit(1);
    }
}
