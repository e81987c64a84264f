//! Error handling module for streambench

use thiserror::Error;

/// Errors raised inside a single decode pipeline.
///
/// Every classified stream error is fatal to the run it occurs in; there are
/// no transient kinds. The scheduler captures them per stream and the run
/// harness promotes the first non-empty one to a run error.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Source could not be opened by the demuxer
    #[error("failed to open source: {0}")]
    Open(String),

    /// Source has no video substream
    #[error("no video stream found")]
    NoVideoStream,

    /// I/O error while reading packets
    #[error("read error: {0}")]
    Read(String),

    /// Codec returned a non-recoverable error
    #[error("decode error: {0}")]
    Decode(String),

    /// A live source reached EOF; live streams are expected to be continuous
    #[error("Stream ended")]
    StreamEnded,
}

/// Main error type for benchmark operations
#[derive(Error, Debug)]
pub enum BenchError {
    /// Bad command line or unusable configuration value
    #[error("{message}")]
    Config { message: String },

    /// Source open/stream-info/codec-lookup failure before any run
    #[error("{message}")]
    Probe { message: String },

    /// A per-stream reader or decoder failed to initialize
    #[error("Stream {stream_id}: {source}")]
    StreamInit {
        stream_id: usize,
        #[source]
        source: StreamError,
    },

    /// A run aborted with a per-stream error
    #[error("{message}")]
    Run { message: String },

    /// CSV export failure
    #[error("failed to write CSV file: {0}")]
    Csv(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FFmpeg error
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
}

/// Result type alias for benchmark operations
pub type BenchResult<T> = std::result::Result<T, BenchError>;
