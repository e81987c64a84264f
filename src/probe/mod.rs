//! Source analysis performed once before the benchmark.
//!
//! Determines the native frame rate, resolution, codec, and live-vs-file
//! flag that the run harness paces against.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::decode::libav;
use crate::error::{BenchError, BenchResult};

const AV_TIME_BASE: f64 = 1_000_000.0;

/// Codecs the benchmark advertises as supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
    Av1,
    Unknown,
}

impl VideoCodec {
    pub fn is_supported(&self) -> bool {
        !matches!(self, VideoCodec::Unknown)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "H.264",
            VideoCodec::H265 => "H.265",
            VideoCodec::Vp9 => "VP9",
            VideoCodec::Av1 => "AV1",
            VideoCodec::Unknown => "Unknown",
        }
    }
}

/// Everything the benchmark needs to know about the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Native frame rate; always > 0 once analysis succeeds.
    pub fps: f64,
    pub duration_seconds: f64,
    pub total_frames: i64,
    pub is_live: bool,
}

impl VideoInfo {
    pub fn codec_name(&self) -> &'static str {
        self.codec.display_name()
    }

    /// Short label for the header line ("480p" … "1080p", "1440p", "4K").
    pub fn resolution_label(&self) -> String {
        match self.height {
            h if h >= 2160 => "4K".to_string(),
            h if h >= 1440 => "1440p".to_string(),
            h if h >= 1080 => "1080p".to_string(),
            h if h >= 720 => "720p".to_string(),
            h if h >= 480 => "480p".to_string(),
            h => format!("{h}p"),
        }
    }
}

/// Live sources are identified by URL scheme before anything is opened.
pub fn is_live_source(source: &str) -> bool {
    source.starts_with("rtsp://") || source.starts_with("rtsps://")
}

fn rational_to_f64(rational: ffmpeg_next::Rational) -> f64 {
    if rational.denominator() != 0 {
        rational.numerator() as f64 / rational.denominator() as f64
    } else {
        0.0
    }
}

fn codec_from_id(id: ffmpeg_next::codec::Id) -> VideoCodec {
    use ffmpeg_next::codec::Id;
    match id {
        Id::H264 => VideoCodec::H264,
        Id::HEVC => VideoCodec::H265,
        Id::VP9 => VideoCodec::Vp9,
        Id::AV1 => VideoCodec::Av1,
        _ => VideoCodec::Unknown,
    }
}

/// Opens the source and extracts the stream facts the benchmark paces
/// against. Any failure here aborts before the first run.
pub fn analyze(source: &str) -> BenchResult<VideoInfo> {
    let is_live = is_live_source(source);
    info!("Analyzing source: {source}");

    let input = libav::open_input(source, is_live).map_err(|e| BenchError::Probe {
        message: e.to_string(),
    })?;

    let stream = input
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| BenchError::Probe {
            message: "No video stream found in source".to_string(),
        })?;

    let mut fps = rational_to_f64(stream.avg_frame_rate());
    if fps <= 0.0 {
        fps = rational_to_f64(stream.rate());
    }
    if fps <= 0.0 {
        return Err(BenchError::Probe {
            message: "Could not determine video frame rate".to_string(),
        });
    }

    let mut duration_seconds = 0.0;
    if input.duration() > 0 {
        duration_seconds = input.duration() as f64 / AV_TIME_BASE;
    } else if stream.duration() > 0 {
        duration_seconds = stream.duration() as f64 * rational_to_f64(stream.time_base());
    }

    let mut total_frames = stream.frames();
    if total_frames <= 0 && duration_seconds > 0.0 {
        total_frames = (duration_seconds * fps).round() as i64;
    }

    let codec = codec_from_id(stream.parameters().id());

    let decoder = ffmpeg_next::codec::Context::from_parameters(stream.parameters())
        .and_then(|context| context.decoder().video())
        .map_err(|e| BenchError::Probe {
            message: format!("Failed to read codec parameters: {e}"),
        })?;

    let info = VideoInfo {
        codec,
        width: decoder.width(),
        height: decoder.height(),
        fps,
        duration_seconds,
        total_frames,
        is_live,
    };
    info!(
        "Source: {}x{} {} at {:.2} fps{}",
        info.width,
        info.height,
        info.codec_name(),
        info.fps,
        if info.is_live { " (live)" } else { "" }
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(height: u32) -> VideoInfo {
        VideoInfo {
            codec: VideoCodec::H264,
            width: height * 16 / 9,
            height,
            fps: 30.0,
            duration_seconds: 60.0,
            total_frames: 1800,
            is_live: false,
        }
    }

    #[test]
    fn test_resolution_labels() {
        assert_eq!(info(2160).resolution_label(), "4K");
        assert_eq!(info(1440).resolution_label(), "1440p");
        assert_eq!(info(1080).resolution_label(), "1080p");
        assert_eq!(info(720).resolution_label(), "720p");
        assert_eq!(info(480).resolution_label(), "480p");
        assert_eq!(info(360).resolution_label(), "360p");
    }

    #[test]
    fn test_live_source_detection() {
        assert!(is_live_source("rtsp://camera.local/stream"));
        assert!(is_live_source("rtsps://camera.local/stream"));
        assert!(!is_live_source("/data/clips/test.mp4"));
        assert!(!is_live_source("http://host/video.mp4"));
    }

    #[test]
    fn test_codec_support() {
        assert!(VideoCodec::H264.is_supported());
        assert!(VideoCodec::Av1.is_supported());
        assert!(!VideoCodec::Unknown.is_supported());
        assert_eq!(VideoCodec::H265.display_name(), "H.265");
    }

    #[test]
    fn test_analyze_rejects_missing_file() {
        let error = analyze("/nonexistent/clip.mp4").err().map(|e| e.to_string());
        assert!(error.is_some());
    }
}
