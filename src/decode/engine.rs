//! Run engine: spins up readers and paced workers for one measurement.
//!
//! Two thread regimes, selected by [`RunPlan`]:
//!
//! - **direct** (N < CPU cores): dedicated reader thread and worker thread
//!   per stream, decoder threading scaled to spare cores.
//! - **pooled** (N ≥ CPU cores): `cpu_cores` reader-pool threads service all
//!   N readers round-robin, N workers keep 1:1 pacing quality, decoders are
//!   single-threaded. Total OS threads ≈ N + cores + 1 versus 2N + 1.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::decode::context::{Pacing, StreamShared, WorkerStream};
use crate::decode::reader::{ReadStep, StreamReader};
use crate::decode::worker::PacedWorker;
use crate::decode::{Decoder, Demuxer, StreamFactory};
use crate::error::BenchError;

/// Streams at or above this count always decode single-threaded.
const MULTI_THREAD_STREAM_THRESHOLD: usize = 4;

/// Reader-pool idle wait; bounds the cost of a missed space notification.
const POOL_IDLE_WAIT: Duration = Duration::from_millis(10);

/// Thread layout for one run at a given stream count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub stream_count: usize,
    pub worker_count: usize,
    pub reader_count: usize,
    pub decoder_threads: usize,
    pub pooled: bool,
}

impl RunPlan {
    /// Selects the regime: direct below the core count, pooled at or above
    /// it. A single stream is always direct. Direct mode gives each decoder
    /// the spare cores while the stream count is small; pooled mode caps
    /// reader threads at the core count.
    pub fn new(stream_count: usize, cpu_cores: usize) -> Self {
        let cpu_cores = cpu_cores.max(1);
        if stream_count <= 1 || stream_count < cpu_cores {
            let decoder_threads = if stream_count >= MULTI_THREAD_STREAM_THRESHOLD {
                1
            } else {
                (cpu_cores / stream_count.max(1)).max(1)
            };
            Self {
                stream_count,
                worker_count: stream_count,
                reader_count: stream_count,
                decoder_threads,
                pooled: false,
            }
        } else {
            Self {
                stream_count,
                worker_count: stream_count,
                reader_count: cpu_cores,
                decoder_threads: 1,
                pooled: true,
            }
        }
    }
}

/// Final per-stream numbers gathered at join.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub stream_id: usize,
    pub frames: i64,
    pub lag_count: i64,
    pub max_lag_ms: f64,
    pub error: Option<String>,
}

/// Publishes the common t0: worker 0 stamps it after the barrier, the rest
/// spin-yield on the release/acquire flag before seeding their pacing.
#[derive(Default)]
struct StartGate {
    start_time: Mutex<Option<Instant>>,
    init_done: AtomicBool,
}

impl StartGate {
    fn publish(&self, t0: Instant) {
        *self.start_time.lock() = Some(t0);
        self.init_done.store(true, Ordering::Release);
    }

    fn wait(&self) -> Instant {
        while !self.init_done.load(Ordering::Acquire) {
            thread::yield_now();
        }
        (*self.start_time.lock()).unwrap_or_else(Instant::now)
    }
}

/// Wakes idle reader-pool threads when a consumer pop frees queue space.
#[derive(Default)]
pub(crate) struct PoolNotifier {
    lock: Mutex<()>,
    condvar: Condvar,
}

impl PoolNotifier {
    pub(crate) fn notify_one(&self) {
        self.condvar.notify_one();
    }

    fn notify_all(&self) {
        self.condvar.notify_all();
    }

    fn wait(&self, stop: &AtomicBool, timeout: Duration) {
        let mut guard = self.lock.lock();
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let _ = self
            .condvar
            .wait_until(&mut guard, Instant::now() + timeout);
    }
}

/// One run's worth of streams, readers, and workers.
///
/// Construction opens every demuxer and decoder up front; a failure there
/// returns [`BenchError::StreamInit`] before any thread exists, so no
/// barrier waiter can ever be stranded by a failed stream.
pub struct DecodeEngine<F: StreamFactory> {
    shared: Vec<Arc<StreamShared<F::Packet>>>,
    worker_handles: Vec<JoinHandle<Vec<WorkerStream<F>>>>,
    reader_handles: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    barrier: Arc<Barrier>,
    notifier: Arc<PoolNotifier>,
}

impl<F: StreamFactory> DecodeEngine<F> {
    /// Builds all stream pipelines and spawns reader and worker threads.
    /// Every worker parks at the start barrier until [`start`] is called.
    ///
    /// [`start`]: DecodeEngine::start
    pub fn launch(
        factory: &F,
        plan: &RunPlan,
        target_fps: f64,
        is_live: bool,
    ) -> Result<Self, BenchError> {
        let frame_interval = Duration::from_secs_f64(1.0 / target_fps);
        let stop = Arc::new(AtomicBool::new(false));
        let notifier = Arc::new(PoolNotifier::default());

        let mut shared = Vec::with_capacity(plan.stream_count);
        let mut readers = Vec::with_capacity(plan.stream_count);
        let mut assignments: Vec<Vec<WorkerStream<F>>> =
            (0..plan.worker_count).map(|_| Vec::new()).collect();

        for stream_id in 0..plan.stream_count {
            let state = StreamShared::new(stream_id);

            let demuxer = factory
                .open_demuxer()
                .map_err(|source| BenchError::StreamInit { stream_id, source })?;
            let decoder = factory
                .open_decoder(&demuxer, plan.decoder_threads)
                .map_err(|source| BenchError::StreamInit { stream_id, source })?;

            readers.push(StreamReader::new(
                demuxer,
                Arc::clone(&state),
                Arc::clone(&stop),
                is_live,
            ));
            assignments[stream_id % plan.worker_count].push(WorkerStream {
                shared: Arc::clone(&state),
                decoder,
                pacing: Pacing::new(frame_interval),
            });
            shared.push(state);
        }

        if plan.pooled {
            for state in &shared {
                let notifier = Arc::clone(&notifier);
                state.queue.set_space_callback(move || notifier.notify_one());
            }
        }

        debug!(
            "Launching engine: {} stream(s), {} worker(s), {} reader(s), {} mode",
            plan.stream_count,
            plan.worker_count,
            plan.reader_count,
            if plan.pooled { "pooled" } else { "direct" }
        );

        let reader_handles = spawn_readers(readers, plan, &stop, &notifier)?;

        let barrier = Arc::new(Barrier::new(plan.worker_count + 1));
        let gate = Arc::new(StartGate::default());
        let mut worker_handles = Vec::with_capacity(plan.worker_count);

        for (worker_id, streams) in assignments.into_iter().enumerate() {
            let stop = Arc::clone(&stop);
            let barrier = Arc::clone(&barrier);
            let gate = Arc::clone(&gate);
            let handle = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || {
                    barrier.wait();
                    if worker_id == 0 {
                        gate.publish(Instant::now());
                    }
                    let start_time = gate.wait();
                    PacedWorker::new(streams, stop).run(start_time)
                })
                .map_err(BenchError::Io)?;
            worker_handles.push(handle);
        }

        Ok(Self {
            shared,
            worker_handles,
            reader_handles,
            stop,
            barrier,
            notifier,
        })
    }

    /// Arrives at the start barrier; the run begins when this returns.
    pub fn start(&self) {
        self.barrier.wait();
    }

    /// Requests cooperative shutdown. Workers observe it within one batch
    /// or queue timeout; readers within one push timeout.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Published frame count for one stream; safe to read mid-run.
    pub fn stream_frames(&self, stream_id: usize) -> i64 {
        self.shared
            .get(stream_id)
            .map_or(0, |state| state.frames_decoded())
    }

    /// Joins workers, drains each decoder of buffered frames, publishes the
    /// final counts, then wakes and joins the readers.
    pub fn join(mut self) -> Result<Vec<StreamOutcome>, BenchError> {
        let mut outcomes: Vec<Option<StreamOutcome>> = Vec::new();
        outcomes.resize_with(self.shared.len(), || None);

        for handle in self.worker_handles.drain(..) {
            let streams = handle.join().map_err(|_| BenchError::Run {
                message: "worker thread panicked".to_string(),
            })?;
            for mut stream in streams {
                if !stream.shared.has_error() {
                    while let Ok(true) = stream.decoder.drain_frame() {
                        stream.pacing.total_frames += 1;
                    }
                }
                stream.shared.publish_frames(stream.pacing.total_frames);

                let stream_id = stream.shared.stream_id;
                outcomes[stream_id] = Some(StreamOutcome {
                    stream_id,
                    frames: stream.pacing.total_frames,
                    lag_count: stream.pacing.lag_count,
                    max_lag_ms: stream.pacing.max_lag_ms,
                    error: stream.shared.error_message(),
                });
            }
        }

        // Idle pool threads are parked on the CV; wake them for shutdown.
        self.notifier.notify_all();
        for handle in self.reader_handles.drain(..) {
            let _ = handle.join();
        }

        Ok(outcomes.into_iter().flatten().collect())
    }
}

fn spawn_readers<F: StreamFactory>(
    readers: Vec<StreamReader<F::Demuxer>>,
    plan: &RunPlan,
    stop: &Arc<AtomicBool>,
    notifier: &Arc<PoolNotifier>,
) -> Result<Vec<JoinHandle<()>>, BenchError> {
    let mut handles = Vec::new();

    if plan.reader_count >= plan.stream_count {
        // 1:1 dedicated reader threads.
        for (index, mut reader) in readers.into_iter().enumerate() {
            let handle = thread::Builder::new()
                .name(format!("reader-{index}"))
                .spawn(move || reader.run())
                .map_err(BenchError::Io)?;
            handles.push(handle);
        }
        return Ok(handles);
    }

    // Pooled: round-robin the N readers over reader_count threads.
    let mut groups: Vec<Vec<StreamReader<F::Demuxer>>> =
        (0..plan.reader_count).map(|_| Vec::new()).collect();
    for (index, reader) in readers.into_iter().enumerate() {
        groups[index % plan.reader_count].push(reader);
    }

    for (pool_id, group) in groups.into_iter().enumerate() {
        let stop = Arc::clone(stop);
        let notifier = Arc::clone(notifier);
        let handle = thread::Builder::new()
            .name(format!("reader-pool-{pool_id}"))
            .spawn(move || pool_reader_loop(group, &stop, &notifier))
            .map_err(BenchError::Io)?;
        handles.push(handle);
    }
    Ok(handles)
}

/// Services a group of readers round-robin. Sleeps on the pool CV only when
/// a full pass made no progress; consumer pops notify it through the queue
/// space callbacks.
fn pool_reader_loop<D: Demuxer>(
    mut readers: Vec<StreamReader<D>>,
    stop: &AtomicBool,
    notifier: &PoolNotifier,
) {
    while !stop.load(Ordering::Relaxed) {
        let mut any_active = false;
        let mut any_did_work = false;

        for reader in readers.iter_mut() {
            match reader.step() {
                ReadStep::Queued | ReadStep::SkippedNonVideo => {
                    any_active = true;
                    any_did_work = true;
                }
                ReadStep::QueueFull => {
                    any_active = true;
                }
                ReadStep::Done => {}
            }
        }

        if !any_active {
            break;
        }
        if !any_did_work {
            notifier.wait(stop, POOL_IDLE_WAIT);
        }
    }

    for reader in readers.iter_mut() {
        reader.finish();
    }
}
