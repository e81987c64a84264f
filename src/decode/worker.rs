//! Paced decode worker.
//!
//! A worker owns a round-robin set of streams and drives their decoders
//! under a strict wall-clock frame cadence. One stream gets the tight
//! single-stream loop; several streams get a cooperative scan that hands
//! each eligible stream one frame per pass, prioritized by due-time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::decode::context::{Pacing, WorkerStream};
use crate::decode::queue::QueueItem;
use crate::decode::{Decoder, StreamFactory};

/// Granularity at which workers publish frame counts and check the stop flag.
pub const BATCH: i64 = 16;

/// A frame is late once it misses its deadline by more than this.
const LAG_TOLERANCE: Duration = Duration::from_millis(1);

/// Pop timeout on the single-stream path; doubles as a liveness check.
const POP_TIMEOUT: Duration = Duration::from_millis(100);

/// Short pop timeout while draining one stream on the scan path.
const DRAIN_POP_TIMEOUT: Duration = Duration::from_millis(1);

/// Yield when every due stream came up empty; packets are on their way.
const STARVED_BACKOFF: Duration = Duration::from_micros(500);

pub struct PacedWorker<F: StreamFactory> {
    streams: Vec<WorkerStream<F>>,
    stop: Arc<AtomicBool>,
}

impl<F: StreamFactory> PacedWorker<F> {
    pub fn new(streams: Vec<WorkerStream<F>>, stop: Arc<AtomicBool>) -> Self {
        Self { streams, stop }
    }

    /// Runs until stop or until every assigned stream finished or failed.
    /// `start_time` is the barrier-synchronized t0 shared by all workers.
    /// Returns the streams (with their decoders) for post-run draining.
    pub fn run(mut self, start_time: Instant) -> Vec<WorkerStream<F>> {
        for stream in &mut self.streams {
            stream.pacing.next_frame_time = start_time;
        }
        match self.streams.len() {
            0 => {}
            1 => run_single(&mut self.streams[0], &self.stop),
            _ => run_scan(&mut self.streams, &self.stop),
        }
        self.streams
    }
}

/// Single-stream fast path: minimum-overhead loop used universally in
/// thread-per-stream mode.
fn run_single<F: StreamFactory>(stream: &mut WorkerStream<F>, stop: &AtomicBool) {
    loop {
        if stream.pacing.total_frames % BATCH == 0 && stop.load(Ordering::Relaxed) {
            break;
        }

        let Some(item) = stream.shared.queue.pop(POP_TIMEOUT) else {
            if stream.shared.queue.is_eof() {
                if let Some(error) = stream.shared.take_reader_error() {
                    stream.shared.set_error(error);
                }
                stream.shared.mark_finished();
                break;
            }
            // Timeout: loop back and re-check the stop flag.
            continue;
        };

        let packet = match item {
            QueueItem::Flush => {
                stream.decoder.flush_buffers();
                continue;
            }
            QueueItem::Packet(packet) => packet,
        };

        match stream.decoder.decode_packet(&packet) {
            // Codec still reordering; no frame, no pacing advance.
            Ok(false) => continue,
            Ok(true) => {}
            Err(error) => {
                stream.shared.set_error(error);
                break;
            }
        }

        stream.pacing.total_frames += 1;
        if stream.pacing.total_frames % BATCH == 0 {
            stream.shared.publish_frames(stream.pacing.total_frames);
        }

        advance_pacing(&mut stream.pacing, true);
    }
}

/// Multi-stream scan path: one frame per eligible stream per pass.
fn run_scan<F: StreamFactory>(streams: &mut [WorkerStream<F>], stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        let mut now = Instant::now();
        let mut earliest_next: Option<Instant> = None;
        let mut any_active = false;
        let mut any_starved = false;

        for stream in streams.iter_mut() {
            if stream.shared.is_finished() || stream.shared.has_error() {
                continue;
            }
            any_active = true;

            if now >= stream.pacing.next_frame_time {
                let got_frame = drain_until_frame(stream, stop);
                if !got_frame && !stream.shared.is_finished() && !stream.shared.has_error() {
                    any_starved = true;
                }
                now = Instant::now();
            }

            if !stream.shared.is_finished() && !stream.shared.has_error() {
                earliest_next = Some(match earliest_next {
                    Some(t) => t.min(stream.pacing.next_frame_time),
                    None => stream.pacing.next_frame_time,
                });
            }
        }

        if !any_active {
            break;
        }

        let now = Instant::now();
        if any_starved {
            thread::sleep(STARVED_BACKOFF);
        } else if let Some(next) = earliest_next {
            if next > now + LAG_TOLERANCE {
                thread::sleep(next - now);
            }
        }
    }
}

/// Feeds one stream's decoder until a frame comes out, the queue reports
/// EOF, the stop flag is set, or an error occurs. Returns whether a frame
/// was produced.
fn drain_until_frame<F: StreamFactory>(stream: &mut WorkerStream<F>, stop: &AtomicBool) -> bool {
    while !stop.load(Ordering::Relaxed) {
        let Some(item) = stream.shared.queue.pop(DRAIN_POP_TIMEOUT) else {
            if stream.shared.queue.is_eof() {
                if let Some(error) = stream.shared.take_reader_error() {
                    stream.shared.set_error(error);
                }
                stream.shared.mark_finished();
            }
            return false;
        };

        let packet = match item {
            QueueItem::Flush => {
                stream.decoder.flush_buffers();
                continue;
            }
            QueueItem::Packet(packet) => packet,
        };

        match stream.decoder.decode_packet(&packet) {
            // Need more packets before a frame can come out.
            Ok(false) => continue,
            Ok(true) => {}
            Err(error) => {
                stream.shared.set_error(error);
                return false;
            }
        }

        stream.pacing.total_frames += 1;
        if stream.pacing.total_frames % BATCH == 0 {
            stream.shared.publish_frames(stream.pacing.total_frames);
        }

        // Advance pacing without sleeping; the scan loop owns the sleeps.
        advance_pacing(&mut stream.pacing, false);
        return true;
    }
    false
}

/// The pacing step shared by both paths. Late frames reset
/// `next_frame_time` to now so debt never accumulates; early frames sleep
/// until their deadline when `sleep_when_early` is set.
fn advance_pacing(pacing: &mut Pacing, sleep_when_early: bool) {
    pacing.next_frame_time += pacing.frame_interval;
    let now = Instant::now();

    if now > pacing.next_frame_time + LAG_TOLERANCE {
        pacing.lag_count += 1;
        let lag_ms = (now - pacing.next_frame_time).as_secs_f64() * 1000.0;
        if lag_ms > pacing.max_lag_ms {
            pacing.max_lag_ms = lag_ms;
        }
        pacing.next_frame_time = now;
    } else if sleep_when_early && now < pacing.next_frame_time {
        thread::sleep(pacing.next_frame_time - now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::context::StreamShared;
    use crate::decode::{Demuxer, ReadEvent};
    use crate::error::StreamError;

    struct NullDemuxer;

    impl Demuxer for NullDemuxer {
        type Packet = u32;

        fn read_packet(&mut self) -> Result<ReadEvent<u32>, StreamError> {
            Ok(ReadEvent::Eof)
        }

        fn seek_to_start(&mut self) -> Result<(), StreamError> {
            Ok(())
        }
    }

    /// Counts frames and flushes; optionally fails on a given packet.
    struct CountingDecoder {
        frames: i64,
        flushes: i64,
        fail_on: Option<u32>,
    }

    impl CountingDecoder {
        fn new() -> Self {
            Self {
                frames: 0,
                flushes: 0,
                fail_on: None,
            }
        }
    }

    impl Decoder for CountingDecoder {
        type Packet = u32;

        fn decode_packet(&mut self, packet: &u32) -> Result<bool, StreamError> {
            if self.fail_on == Some(*packet) {
                return Err(StreamError::Decode("forced failure".into()));
            }
            self.frames += 1;
            Ok(true)
        }

        fn flush_buffers(&mut self) {
            self.flushes += 1;
        }

        fn drain_frame(&mut self) -> Result<bool, StreamError> {
            Ok(false)
        }
    }

    struct TestFactory;

    impl StreamFactory for TestFactory {
        type Packet = u32;
        type Demuxer = NullDemuxer;
        type Decoder = CountingDecoder;

        fn open_demuxer(&self) -> Result<NullDemuxer, StreamError> {
            Ok(NullDemuxer)
        }

        fn open_decoder(&self, _: &NullDemuxer, _: usize) -> Result<CountingDecoder, StreamError> {
            Ok(CountingDecoder::new())
        }
    }

    fn worker_stream(interval: Duration) -> WorkerStream<TestFactory> {
        WorkerStream {
            shared: StreamShared::new(0),
            decoder: CountingDecoder::new(),
            pacing: Pacing::new(interval),
        }
    }

    const PUSH: Duration = Duration::from_millis(10);

    #[test]
    fn test_single_path_decodes_queue_to_eof() {
        let mut stream = worker_stream(Duration::from_micros(100));
        for n in 0..24u32 {
            assert!(stream.shared.queue.push(QueueItem::Packet(n), PUSH).is_ok());
        }
        stream.shared.queue.signal_eof();
        let stop = AtomicBool::new(false);

        run_single(&mut stream, &stop);

        assert_eq!(stream.pacing.total_frames, 24);
        assert!(stream.shared.is_finished());
        assert!(!stream.shared.has_error());
        // Published at the batch boundary; the tail past it is only
        // published by the harness after join.
        assert_eq!(stream.shared.frames_decoded(), 16);
        assert!(stream.pacing.total_frames >= stream.shared.frames_decoded());
    }

    #[test]
    fn test_single_path_flush_marker_flushes_decoder() {
        let mut stream = worker_stream(Duration::from_micros(100));
        assert!(stream.shared.queue.push(QueueItem::Packet(1), PUSH).is_ok());
        assert!(stream.shared.queue.push_flush(PUSH));
        assert!(stream.shared.queue.push(QueueItem::Packet(2), PUSH).is_ok());
        stream.shared.queue.signal_eof();
        let stop = AtomicBool::new(false);

        run_single(&mut stream, &stop);

        assert_eq!(stream.decoder.flushes, 1);
        assert_eq!(stream.pacing.total_frames, 2);
        assert!(!stream.shared.has_error());
    }

    #[test]
    fn test_single_path_decode_error_stops_stream() {
        let mut stream = worker_stream(Duration::from_micros(100));
        stream.decoder.fail_on = Some(3);
        for n in 1..=5u32 {
            assert!(stream.shared.queue.push(QueueItem::Packet(n), PUSH).is_ok());
        }
        stream.shared.queue.signal_eof();
        let stop = AtomicBool::new(false);

        run_single(&mut stream, &stop);

        assert!(stream.shared.has_error());
        assert_eq!(stream.pacing.total_frames, 2);
        let message = stream.shared.error_message();
        assert_eq!(message.as_deref(), Some("decode error: forced failure"));
    }

    #[test]
    fn test_single_path_surfaces_reader_error_at_eof() {
        let mut stream = worker_stream(Duration::from_micros(100));
        stream.shared.set_reader_error(StreamError::StreamEnded);
        stream.shared.queue.signal_eof();
        let stop = AtomicBool::new(false);

        run_single(&mut stream, &stop);

        assert!(stream.shared.has_error());
        assert!(stream.shared.is_finished());
        assert_eq!(
            stream.shared.error_message().as_deref(),
            Some("Stream ended")
        );
    }

    #[test]
    fn test_scan_path_services_all_streams() {
        let mut streams: Vec<WorkerStream<TestFactory>> = (0..3)
            .map(|_| worker_stream(Duration::from_micros(200)))
            .collect();
        for stream in &streams {
            for n in 0..20u32 {
                assert!(stream.shared.queue.push(QueueItem::Packet(n), PUSH).is_ok());
            }
            stream.shared.queue.signal_eof();
        }
        let stop = AtomicBool::new(false);

        run_scan(&mut streams, &stop);

        for stream in &streams {
            assert_eq!(stream.pacing.total_frames, 20);
            assert!(stream.shared.is_finished());
        }
    }

    #[test]
    fn test_lag_resets_next_frame_time() {
        let mut pacing = Pacing::new(Duration::from_millis(5));
        // Deadline far in the past forces a lag event.
        pacing.next_frame_time = Instant::now() - Duration::from_millis(50);
        advance_pacing(&mut pacing, false);

        assert_eq!(pacing.lag_count, 1);
        assert!(pacing.max_lag_ms >= 40.0);
        // Reset: the next deadline is anchored to now, not the past.
        assert!(pacing.next_frame_time >= Instant::now() - Duration::from_millis(5));
    }

    #[test]
    fn test_on_time_frame_keeps_cadence() {
        let mut pacing = Pacing::new(Duration::from_millis(50));
        pacing.next_frame_time = Instant::now() + Duration::from_millis(20);
        let expected = pacing.next_frame_time + pacing.frame_interval;
        advance_pacing(&mut pacing, false);

        assert_eq!(pacing.lag_count, 0);
        assert_eq!(pacing.next_frame_time, expected);
    }
}
