//! Command-line argument definitions

use std::path::PathBuf;

use clap::Parser;

const AFTER_HELP: &str = "\
Supported codecs: H.264, H.265/HEVC, VP9, AV1
Supported inputs: Local files, RTSP streams (rtsp://)

Examples:
  streambench video.mp4
  streambench --max-streams 8 video.mp4
  streambench --target-fps 30 rtsp://camera.local/stream
  streambench --csv-file results.csv video.mp4";

/// Video decoding benchmark tool - measures concurrent decoding capacity
#[derive(Parser, Debug)]
#[command(
    name = "streambench",
    version,
    about = "Video decoding benchmark tool - measures concurrent decoding capacity",
    disable_version_flag = true,
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Path to video file or RTSP URL
    pub video_source: String,

    /// Maximum number of streams to test (default: CPU thread count)
    #[arg(short = 'm', long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_streams: Option<u32>,

    /// Target FPS for real-time threshold (default: video's native FPS)
    #[arg(short = 'f', long, value_name = "FPS", value_parser = parse_positive_fps)]
    pub target_fps: Option<f64>,

    /// Log file path (default: video-benchmark.log)
    #[arg(short = 'l', long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Export results to CSV file
    #[arg(short = 'c', long, value_name = "PATH")]
    pub csv_file: Option<PathBuf>,

    /// Print version information
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,
}

fn parse_positive_fps(value: &str) -> Result<f64, String> {
    let fps: f64 = value
        .parse()
        .map_err(|_| "must be a positive number".to_string())?;
    if fps > 0.0 && fps.is_finite() {
        Ok(fps)
    } else {
        Err("must be a positive number".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["streambench", "video.mp4"]).expect("parse");
        assert_eq!(cli.video_source, "video.mp4");
        assert!(cli.max_streams.is_none());
        assert!(cli.target_fps.is_none());
    }

    #[test]
    fn test_parse_all_options() {
        let cli = Cli::try_parse_from([
            "streambench",
            "-m",
            "8",
            "-f",
            "29.97",
            "-l",
            "bench.log",
            "-c",
            "out.csv",
            "rtsp://camera/stream",
        ])
        .expect("parse");
        assert_eq!(cli.max_streams, Some(8));
        assert_eq!(cli.target_fps, Some(29.97));
        assert_eq!(cli.log_file.as_deref(), Some(std::path::Path::new("bench.log")));
        assert_eq!(cli.csv_file.as_deref(), Some(std::path::Path::new("out.csv")));
        assert_eq!(cli.video_source, "rtsp://camera/stream");
    }

    #[test]
    fn test_rejects_zero_max_streams() {
        assert!(Cli::try_parse_from(["streambench", "-m", "0", "video.mp4"]).is_err());
    }

    #[test]
    fn test_rejects_non_positive_fps() {
        assert!(Cli::try_parse_from(["streambench", "-f", "0", "video.mp4"]).is_err());
        assert!(Cli::try_parse_from(["streambench", "-f", "-5", "video.mp4"]).is_err());
        assert!(Cli::try_parse_from(["streambench", "-f", "abc", "video.mp4"]).is_err());
    }

    #[test]
    fn test_rejects_missing_source() {
        assert!(Cli::try_parse_from(["streambench"]).is_err());
    }

    #[test]
    fn test_rejects_extra_positional() {
        assert!(Cli::try_parse_from(["streambench", "a.mp4", "b.mp4"]).is_err());
    }
}
