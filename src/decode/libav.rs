//! FFmpeg-backed demuxer and decoder.
//!
//! Each stream owns its own format and codec context; nothing here is
//! shared across threads. Hardware acceleration is never configured, so
//! every frame goes through the software path the benchmark is measuring.

use ffmpeg_next::{codec, format, media, Dictionary, Packet};

use crate::decode::{Decoder, Demuxer, ReadEvent, StreamFactory};
use crate::error::StreamError;

/// RTSP sources use reliable transport with a finite socket timeout so a
/// dead camera fails the run instead of hanging it.
const RTSP_TRANSPORT: &str = "tcp";
const RTSP_SOCKET_TIMEOUT_US: &str = "5000000";

/// Opens a container, applying the live-source I/O options when needed.
pub(crate) fn open_input(
    source: &str,
    is_live: bool,
) -> Result<format::context::Input, StreamError> {
    let source = source.to_string();
    let opened = if is_live {
        let mut options = Dictionary::new();
        options.set("rtsp_transport", RTSP_TRANSPORT);
        options.set("stimeout", RTSP_SOCKET_TIMEOUT_US);
        format::input_with_dictionary(&source, options)
    } else {
        format::input(&source)
    };
    opened.map_err(|e| StreamError::Open(e.to_string()))
}

/// Demuxer over one FFmpeg input context, filtered to the first video
/// substream found at open time.
pub struct FfmpegDemuxer {
    input: format::context::Input,
    video_stream_index: usize,
}

impl FfmpegDemuxer {
    pub fn open(source: &str, is_live: bool) -> Result<Self, StreamError> {
        let input = open_input(source, is_live)?;
        let video_stream_index = input
            .streams()
            .best(media::Type::Video)
            .ok_or(StreamError::NoVideoStream)?
            .index();
        Ok(Self {
            input,
            video_stream_index,
        })
    }

    /// Codec parameters of the selected video substream.
    pub fn video_parameters(&self) -> Result<codec::Parameters, StreamError> {
        self.input
            .streams()
            .find(|stream| stream.index() == self.video_stream_index)
            .map(|stream| stream.parameters())
            .ok_or(StreamError::NoVideoStream)
    }
}

impl Demuxer for FfmpegDemuxer {
    type Packet = Packet;

    fn read_packet(&mut self) -> Result<ReadEvent<Packet>, StreamError> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {
                if packet.stream() == self.video_stream_index {
                    Ok(ReadEvent::Video(packet))
                } else {
                    Ok(ReadEvent::Other)
                }
            }
            Err(ffmpeg_next::Error::Eof) => Ok(ReadEvent::Eof),
            Err(error) => Err(StreamError::Read(error.to_string())),
        }
    }

    fn seek_to_start(&mut self) -> Result<(), StreamError> {
        self.input
            .seek(0, ..)
            .map_err(|e| StreamError::Read(format!("seek to start: {e}")))
    }
}

/// Software video decoder built from retained codec parameters.
pub struct FfmpegDecoder {
    decoder: codec::decoder::Video,
    frame: ffmpeg_next::frame::Video,
    draining: bool,
}

impl FfmpegDecoder {
    /// `decoder_threads == 1` disables frame-threading entirely; larger
    /// counts enable it with the given thread count.
    pub fn from_parameters(
        parameters: codec::Parameters,
        decoder_threads: usize,
    ) -> Result<Self, StreamError> {
        let mut context = codec::Context::from_parameters(parameters)
            .map_err(|e| StreamError::Decode(format!("codec parameters: {e}")))?;

        let mut threading = codec::threading::Config::default();
        if decoder_threads <= 1 {
            threading.kind = codec::threading::Type::None;
            threading.count = 1;
        } else {
            threading.kind = codec::threading::Type::Frame;
            threading.count = decoder_threads;
        }
        context.set_threading(threading);

        let decoder = context
            .decoder()
            .video()
            .map_err(|e| StreamError::Decode(format!("open codec: {e}")))?;

        Ok(Self {
            decoder,
            frame: ffmpeg_next::frame::Video::empty(),
            draining: false,
        })
    }

    fn receive_one(&mut self) -> Result<bool, StreamError> {
        match self.decoder.receive_frame(&mut self.frame) {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN =>
            {
                Ok(false)
            }
            Err(error) => Err(StreamError::Decode(format!("receive_frame: {error}"))),
        }
    }
}

impl Decoder for FfmpegDecoder {
    type Packet = Packet;

    fn decode_packet(&mut self, packet: &Packet) -> Result<bool, StreamError> {
        match self.decoder.send_packet(packet) {
            Ok(()) => {}
            // EAGAIN: the decoder has buffered frames to hand out first.
            Err(ffmpeg_next::Error::Other { errno })
                if errno == ffmpeg_next::util::error::EAGAIN => {}
            Err(error) => return Err(StreamError::Decode(format!("send_packet: {error}"))),
        }
        self.receive_one()
    }

    fn flush_buffers(&mut self) {
        self.decoder.flush();
    }

    fn drain_frame(&mut self) -> Result<bool, StreamError> {
        if !self.draining {
            self.draining = true;
            match self.decoder.send_eof() {
                Ok(()) | Err(ffmpeg_next::Error::Eof) => {}
                Err(error) => return Err(StreamError::Decode(format!("send_eof: {error}"))),
            }
        }
        self.receive_one()
    }
}

/// Production stream factory: every stream opens the same source URI.
pub struct LibavFactory {
    source: String,
    is_live: bool,
}

impl LibavFactory {
    pub fn new(source: impl Into<String>, is_live: bool) -> Self {
        Self {
            source: source.into(),
            is_live,
        }
    }
}

impl StreamFactory for LibavFactory {
    type Packet = Packet;
    type Demuxer = FfmpegDemuxer;
    type Decoder = FfmpegDecoder;

    fn open_demuxer(&self) -> Result<FfmpegDemuxer, StreamError> {
        FfmpegDemuxer::open(&self.source, self.is_live)
    }

    fn open_decoder(
        &self,
        demuxer: &FfmpegDemuxer,
        decoder_threads: usize,
    ) -> Result<FfmpegDecoder, StreamError> {
        FfmpegDecoder::from_parameters(demuxer.video_parameters()?, decoder_threads)
    }
}
