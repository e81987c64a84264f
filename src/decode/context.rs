//! Per-stream state shared between reader, worker, and run harness.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::decode::queue::PacketQueue;
use crate::decode::StreamFactory;
use crate::error::StreamError;

/// The thread-shared half of a stream context: the packet queue plus the
/// published counters and flags. Pacing state lives in [`Pacing`], owned
/// exclusively by the assigned worker.
pub struct StreamShared<P> {
    pub stream_id: usize,
    pub queue: PacketQueue<P>,
    frames_decoded: AtomicI64,
    has_error: AtomicBool,
    finished: AtomicBool,
    reader_error: Mutex<Option<StreamError>>,
    worker_error: Mutex<Option<StreamError>>,
}

impl<P> StreamShared<P> {
    pub fn new(stream_id: usize) -> Arc<Self> {
        Arc::new(Self {
            stream_id,
            queue: PacketQueue::with_default_capacity(),
            frames_decoded: AtomicI64::new(0),
            has_error: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            reader_error: Mutex::new(None),
            worker_error: Mutex::new(None),
        })
    }

    /// Relaxed publish; readers tolerate slight staleness. The final value
    /// is written after join, which establishes the happens-before edge.
    pub fn publish_frames(&self, total: i64) {
        self.frames_decoded.store(total, Ordering::Relaxed);
    }

    pub fn frames_decoded(&self) -> i64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    /// Records an error hit on the reader side. The worker surfaces it when
    /// it observes queue EOF. First error wins.
    pub fn set_reader_error(&self, error: StreamError) {
        let mut slot = self.reader_error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub fn take_reader_error(&self) -> Option<StreamError> {
        self.reader_error.lock().take()
    }

    /// Marks the stream failed. First error wins.
    pub fn set_error(&self, error: StreamError) {
        let mut slot = self.worker_error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.has_error.store(true, Ordering::Release);
    }

    pub fn error_message(&self) -> Option<String> {
        self.worker_error.lock().as_ref().map(|e| e.to_string())
    }

    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::Relaxed)
    }

    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

/// Wall-clock pacing state for one stream. `next_frame_time` is monotonic
/// non-decreasing except on a lag reset, which forces it to `now` so debt
/// cannot accumulate under sustained overload.
pub struct Pacing {
    pub next_frame_time: Instant,
    pub frame_interval: Duration,
    pub total_frames: i64,
    pub lag_count: i64,
    pub max_lag_ms: f64,
}

impl Pacing {
    /// `frame_interval` is fixed at construction; `next_frame_time` is a
    /// placeholder until the worker seeds it from the common start time.
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            next_frame_time: Instant::now(),
            frame_interval,
            total_frames: 0,
            lag_count: 0,
            max_lag_ms: 0.0,
        }
    }
}

/// A stream as owned by its worker: shared state plus the exclusively-owned
/// decoder and pacing. Returned through the worker's join handle so the
/// harness can drain the decoder after the run.
pub struct WorkerStream<F: StreamFactory> {
    pub shared: Arc<StreamShared<F::Packet>>,
    pub decoder: F::Decoder,
    pub pacing: Pacing,
}
