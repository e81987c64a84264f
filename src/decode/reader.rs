//! I/O-dedicated packet reader.
//!
//! Pulls packets from a demuxer and pushes the video ones into the stream's
//! bounded queue. In direct mode each reader runs its own thread via
//! [`StreamReader::run`]; in pooled mode the reader pool drives readers
//! through the non-blocking [`StreamReader::step`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::decode::context::StreamShared;
use crate::decode::queue::QueueItem;
use crate::decode::{Demuxer, ReadEvent};
use crate::error::StreamError;

/// Push timeout; bounds how long a reader stays blind to the stop flag.
const PUSH_TIMEOUT: Duration = Duration::from_millis(100);

/// Outcome of one non-blocking reader step (pooled mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStep {
    /// A packet or flush marker was queued.
    Queued,
    /// The queue had no space; the item is held pending.
    QueueFull,
    /// A non-video packet was skipped.
    SkippedNonVideo,
    /// The reader finished (live EOF, read error, or already done).
    Done,
}

pub struct StreamReader<D: Demuxer> {
    demuxer: D,
    shared: Arc<StreamShared<D::Packet>>,
    stop: Arc<AtomicBool>,
    is_live: bool,
    pending: Option<QueueItem<D::Packet>>,
    done: bool,
}

impl<D: Demuxer> StreamReader<D> {
    pub fn new(
        demuxer: D,
        shared: Arc<StreamShared<D::Packet>>,
        stop: Arc<AtomicBool>,
        is_live: bool,
    ) -> Self {
        Self {
            demuxer,
            shared,
            stop,
            is_live,
            pending: None,
            done: false,
        }
    }

    /// Dedicated-thread loop. Reads until the stop flag, a read error, or a
    /// live-mode EOF, then signals EOF on the queue.
    pub fn run(&mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            match self.demuxer.read_packet() {
                Ok(ReadEvent::Video(packet)) => {
                    let mut item = QueueItem::Packet(packet);
                    loop {
                        match self.shared.queue.push(item, PUSH_TIMEOUT) {
                            Ok(()) => break,
                            Err(rejected) => {
                                if self.stop.load(Ordering::Relaxed) {
                                    // Discard; the run is over.
                                    break;
                                }
                                item = rejected;
                            }
                        }
                    }
                }
                Ok(ReadEvent::Other) => {}
                Ok(ReadEvent::Eof) => {
                    if self.is_live {
                        self.shared.set_reader_error(StreamError::StreamEnded);
                        break;
                    }
                    if let Err(error) = self.demuxer.seek_to_start() {
                        self.shared.set_reader_error(error);
                        break;
                    }
                    // Decoder must drop stale reference frames before the
                    // next loop of the same file.
                    let _ = self.shared.queue.push_flush(PUSH_TIMEOUT);
                }
                Err(error) => {
                    self.shared.set_reader_error(error);
                    break;
                }
            }
        }
        self.finish();
    }

    /// One non-blocking unit of work for the reader pool. Holds at most one
    /// pending item so a full queue never loses a packet.
    pub fn step(&mut self) -> ReadStep {
        if self.done {
            return ReadStep::Done;
        }

        if let Some(item) = self.pending.take() {
            return match self.shared.queue.try_push(item) {
                Ok(()) => ReadStep::Queued,
                Err(rejected) => {
                    self.pending = Some(rejected);
                    ReadStep::QueueFull
                }
            };
        }

        match self.demuxer.read_packet() {
            Ok(ReadEvent::Video(packet)) => self.offer(QueueItem::Packet(packet)),
            Ok(ReadEvent::Other) => ReadStep::SkippedNonVideo,
            Ok(ReadEvent::Eof) => {
                if self.is_live {
                    self.shared.set_reader_error(StreamError::StreamEnded);
                    self.finish();
                    return ReadStep::Done;
                }
                match self.demuxer.seek_to_start() {
                    Ok(()) => self.offer(QueueItem::Flush),
                    Err(error) => {
                        self.shared.set_reader_error(error);
                        self.finish();
                        ReadStep::Done
                    }
                }
            }
            Err(error) => {
                self.shared.set_reader_error(error);
                self.finish();
                ReadStep::Done
            }
        }
    }

    /// Marks the reader finished and signals EOF to the consumer. Idempotent.
    pub fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.shared.queue.signal_eof();
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn offer(&mut self, item: QueueItem<D::Packet>) -> ReadStep {
        match self.shared.queue.try_push(item) {
            Ok(()) => ReadStep::Queued,
            Err(rejected) => {
                self.pending = Some(rejected);
                ReadStep::QueueFull
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Demuxer yielding a fixed number of video packets, then EOF. Seeking
    /// rewinds the counter, so file mode loops forever.
    struct ScriptedDemuxer {
        packets: u64,
        produced: u64,
        seeks: u64,
        interleave_other: bool,
    }

    impl ScriptedDemuxer {
        fn new(packets: u64) -> Self {
            Self {
                packets,
                produced: 0,
                seeks: 0,
                interleave_other: false,
            }
        }
    }

    impl Demuxer for ScriptedDemuxer {
        type Packet = u64;

        fn read_packet(&mut self) -> Result<ReadEvent<u64>, StreamError> {
            if self.produced >= self.packets {
                return Ok(ReadEvent::Eof);
            }
            self.produced += 1;
            if self.interleave_other && self.produced % 2 == 0 {
                return Ok(ReadEvent::Other);
            }
            Ok(ReadEvent::Video(self.produced))
        }

        fn seek_to_start(&mut self) -> Result<(), StreamError> {
            self.produced = 0;
            self.seeks += 1;
            Ok(())
        }
    }

    fn reader_parts(
        packets: u64,
        is_live: bool,
    ) -> (StreamReader<ScriptedDemuxer>, Arc<StreamShared<u64>>, Arc<AtomicBool>) {
        let shared = StreamShared::new(0);
        let stop = Arc::new(AtomicBool::new(false));
        let reader = StreamReader::new(
            ScriptedDemuxer::new(packets),
            Arc::clone(&shared),
            Arc::clone(&stop),
            is_live,
        );
        (reader, shared, stop)
    }

    #[test]
    fn test_step_queues_video_packets() {
        let (mut reader, shared, _stop) = reader_parts(3, false);
        assert_eq!(reader.step(), ReadStep::Queued);
        assert_eq!(shared.queue.len(), 1);
    }

    #[test]
    fn test_step_skips_non_video_packets() {
        let (mut reader, _shared, _stop) = reader_parts(4, false);
        reader.demuxer.interleave_other = true;
        assert_eq!(reader.step(), ReadStep::Queued);
        assert_eq!(reader.step(), ReadStep::SkippedNonVideo);
    }

    #[test]
    fn test_file_eof_seeks_and_emits_flush_marker() {
        let (mut reader, shared, _stop) = reader_parts(1, false);
        assert_eq!(reader.step(), ReadStep::Queued);
        // EOF in file mode: seek then flush marker.
        assert_eq!(reader.step(), ReadStep::Queued);
        assert_eq!(reader.demuxer.seeks, 1);

        let first = shared.queue.pop(Duration::from_millis(10));
        assert!(matches!(first, Some(QueueItem::Packet(1))));
        let second = shared.queue.pop(Duration::from_millis(10));
        assert!(matches!(second, Some(QueueItem::Flush)));
    }

    #[test]
    fn test_live_eof_records_stream_ended() {
        let (mut reader, shared, _stop) = reader_parts(0, true);
        assert_eq!(reader.step(), ReadStep::Done);
        assert!(reader.is_done());
        let error = shared.take_reader_error().map(|e| e.to_string());
        assert_eq!(error.as_deref(), Some("Stream ended"));
        assert!(shared.queue.is_eof());
    }

    #[test]
    fn test_full_queue_holds_pending_packet() {
        let (mut reader, shared, _stop) = reader_parts(u64::MAX, false);
        // Fill the queue to capacity.
        loop {
            match reader.step() {
                ReadStep::Queued => continue,
                ReadStep::QueueFull => break,
                other => panic!("unexpected step: {other:?}"),
            }
        }
        let depth = shared.queue.len();
        // Stuck on the same pending packet, no loss.
        assert_eq!(reader.step(), ReadStep::QueueFull);
        assert_eq!(shared.queue.len(), depth);

        let popped = shared.queue.pop(Duration::from_millis(10));
        assert!(popped.is_some());
        assert_eq!(reader.step(), ReadStep::Queued);
        assert_eq!(shared.queue.len(), depth);
    }

    #[test]
    fn test_run_stops_on_stop_flag_and_signals_eof() {
        let (mut reader, shared, stop) = reader_parts(2, false);
        stop.store(true, Ordering::Relaxed);
        reader.run();
        assert!(shared.queue.is_eof());
    }

    #[test]
    fn test_run_live_mode_ends_with_error() {
        let (mut reader, shared, _stop) = reader_parts(5, true);
        reader.run();
        // All five packets were queued, then live EOF ended the run.
        assert_eq!(shared.queue.len(), 5);
        let error = shared.take_reader_error().map(|e| e.to_string());
        assert_eq!(error.as_deref(), Some("Stream ended"));
    }
}
