//! Real-time paced multi-stream decode scheduler.
//!
//! Data flow per stream: source → [`reader::StreamReader`] →
//! [`queue::PacketQueue`] → decoder → frame count + pacing state. The
//! scheduler never touches pixels; it counts decoded frames under a strict
//! per-stream wall-clock cadence.
//!
//! Demux and decode primitives live behind the [`Demuxer`] and [`Decoder`]
//! traits so the scheduler can be driven by the FFmpeg-backed
//! implementations in [`libav`] or by synthetic sources in tests.

pub mod context;
pub mod engine;
pub mod libav;
pub mod queue;
pub mod reader;
pub mod worker;

use crate::error::StreamError;

/// Outcome of pulling one packet from a demuxer.
pub enum ReadEvent<P> {
    /// A packet belonging to the selected video substream.
    Video(P),
    /// A packet from some other substream; ignored without error.
    Other,
    /// End of input.
    Eof,
}

/// Packet source for one stream: open container, sequential packet reads,
/// seek back to the start on a file loop.
pub trait Demuxer: Send {
    type Packet: Send + 'static;

    fn read_packet(&mut self) -> Result<ReadEvent<Self::Packet>, StreamError>;

    fn seek_to_start(&mut self) -> Result<(), StreamError>;
}

/// Per-stream video decoder over an already-initialized codec context.
pub trait Decoder: Send {
    type Packet;

    /// Submits one packet and attempts to receive a frame. `Ok(false)` is a
    /// normal outcome while the codec is still reordering (B-frames).
    fn decode_packet(&mut self, packet: &Self::Packet) -> Result<bool, StreamError>;

    /// Drops decoder-internal reorder state; used after a file-loop boundary
    /// to discard references to pre-seek data.
    fn flush_buffers(&mut self);

    /// Sends end-of-stream on the first call and drains one buffered frame
    /// per call; `Ok(false)` once the decoder is empty.
    fn drain_frame(&mut self) -> Result<bool, StreamError>;
}

/// Opens the demuxer/decoder pair for each stream of a run.
pub trait StreamFactory: Send + Sync {
    type Packet: Send + 'static;
    type Demuxer: Demuxer<Packet = Self::Packet> + 'static;
    type Decoder: Decoder<Packet = Self::Packet> + 'static;

    fn open_demuxer(&self) -> Result<Self::Demuxer, StreamError>;

    /// Opens a decoder from the demuxer's retained codec parameters.
    /// `decoder_threads == 1` disables frame-threading.
    fn open_decoder(
        &self,
        demuxer: &Self::Demuxer,
        decoder_threads: usize,
    ) -> Result<Self::Decoder, StreamError>;
}
