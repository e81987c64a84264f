//! Thread-safe bounded packet queue.
//!
//! Decouples I/O (packet reading) from CPU-intensive decoding. One producer
//! pushes compressed packets, one consumer pops them under a timeout. The
//! queue carries a distinguished flush marker so the reader can tell the
//! decoder to drop its reorder state across a file-loop boundary.

use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Default queue depth; enough to absorb decode jitter without hoarding
/// memory across hundreds of streams.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// An entry handed from reader to worker.
pub enum QueueItem<P> {
    /// An owned compressed packet.
    Packet(P),
    /// Flush sentinel: the reader looped back to the start of the file and
    /// the decoder must discard references to pre-seek data.
    Flush,
}

type SpaceCallback = Box<dyn Fn() + Send + Sync>;

struct Inner<P> {
    items: VecDeque<QueueItem<P>>,
    eof: bool,
}

/// Fixed-capacity FIFO with an EOF latch and an optional space callback.
///
/// Once EOF is signaled it stays set: pushes fail immediately and pops drain
/// the remaining items, then return `None` without blocking.
pub struct PacketQueue<P> {
    inner: Mutex<Inner<P>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    space_callback: OnceLock<SpaceCallback>,
}

impl<P> PacketQueue<P> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                eof: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            space_callback: OnceLock::new(),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }

    /// Registers a callback fired exactly once per successful pop, outside
    /// the queue lock. Must be called before producers and consumers start;
    /// later calls are ignored.
    pub fn set_space_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        let _ = self.space_callback.set(Box::new(callback));
    }

    /// Blocks up to `timeout` waiting for space. Returns the rejected item
    /// if the timeout elapsed while full or EOF was signaled, so the caller
    /// can retry or drop it.
    pub fn push(&self, item: QueueItem<P>, timeout: Duration) -> Result<(), QueueItem<P>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while inner.items.len() >= self.capacity && !inner.eof {
            if self.not_full.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        if inner.eof || inner.items.len() >= self.capacity {
            return Err(item);
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking push used by pooled readers; the rejected item comes
    /// back so no packet is lost on a full queue.
    pub fn try_push(&self, item: QueueItem<P>) -> Result<(), QueueItem<P>> {
        let mut inner = self.inner.lock();
        if inner.eof || inner.items.len() >= self.capacity {
            return Err(item);
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pushes the flush sentinel under the same contract as `push`.
    pub fn push_flush(&self, timeout: Duration) -> bool {
        self.push(QueueItem::Flush, timeout).is_ok()
    }

    /// Blocks up to `timeout`. Returns `None` when the timeout elapsed with
    /// an empty queue, or when the queue is empty and EOF is set.
    pub fn pop(&self, timeout: Duration) -> Option<QueueItem<P>> {
        let item = {
            let deadline = Instant::now() + timeout;
            let mut inner = self.inner.lock();
            while inner.items.is_empty() && !inner.eof {
                if self.not_empty.wait_until(&mut inner, deadline).timed_out() {
                    break;
                }
            }
            inner.items.pop_front()
        };
        if item.is_some() {
            self.not_full.notify_one();
            // Fired after releasing the queue lock so a reader-pool CV
            // callback cannot invert lock order.
            if let Some(callback) = self.space_callback.get() {
                callback();
            }
        }
        item
    }

    /// Latches EOF and wakes all waiters on both conditions.
    pub fn signal_eof(&self) {
        let mut inner = self.inner.lock();
        inner.eof = true;
        drop(inner);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// True once EOF has been signaled and the queue has drained.
    pub fn is_eof(&self) -> bool {
        let inner = self.inner.lock();
        inner.eof && inner.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Drains all items, releasing their storage.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.items.clear();
        drop(inner);
        self.not_full.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SHORT: Duration = Duration::from_millis(10);

    fn packet(n: u32) -> QueueItem<u32> {
        QueueItem::Packet(n)
    }

    #[test]
    fn test_push_pop_fifo_order() {
        let queue = PacketQueue::new(4);
        assert!(queue.push(packet(1), SHORT).is_ok());
        assert!(queue.push(packet(2), SHORT).is_ok());
        match queue.pop(SHORT) {
            Some(QueueItem::Packet(n)) => assert_eq!(n, 1),
            _ => panic!("expected first packet"),
        }
        match queue.pop(SHORT) {
            Some(QueueItem::Packet(n)) => assert_eq!(n, 2),
            _ => panic!("expected second packet"),
        }
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let queue = PacketQueue::new(2);
        assert!(queue.push(packet(1), SHORT).is_ok());
        assert!(queue.push(packet(2), SHORT).is_ok());
        assert!(queue.push(packet(3), SHORT).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_pop_times_out_on_empty_queue() {
        let queue: PacketQueue<u32> = PacketQueue::new(4);
        assert!(queue.pop(SHORT).is_none());
    }

    #[test]
    fn test_push_fails_after_eof() {
        let queue = PacketQueue::new(4);
        queue.signal_eof();
        assert!(queue.push(packet(1), SHORT).is_err());
    }

    #[test]
    fn test_pop_drains_then_reports_eof() {
        let queue = PacketQueue::new(4);
        assert!(queue.push(packet(1), SHORT).is_ok());
        queue.signal_eof();
        assert!(!queue.is_eof());
        assert!(queue.pop(SHORT).is_some());
        assert!(queue.is_eof());
        // No blocking once drained and EOF is latched.
        assert!(queue.pop(Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_flush_marker_round_trip() {
        let queue: PacketQueue<u32> = PacketQueue::new(4);
        assert!(queue.push_flush(SHORT));
        match queue.pop(SHORT) {
            Some(QueueItem::Flush) => {}
            _ => panic!("expected flush marker"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_space_callback_fires_once_per_pop() {
        let queue = PacketQueue::new(4);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        queue.set_space_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(queue.push(packet(1), SHORT).is_ok());
        assert!(queue.push(packet(2), SHORT).is_ok());
        assert!(queue.pop(SHORT).is_some());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(queue.pop(SHORT).is_some());
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        // Timed-out pop must not fire the callback.
        assert!(queue.pop(SHORT).is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_try_push_returns_item_when_full() {
        let queue = PacketQueue::new(1);
        assert!(queue.try_push(packet(1)).is_ok());
        match queue.try_push(packet(2)) {
            Err(QueueItem::Packet(n)) => assert_eq!(n, 2),
            _ => panic!("expected rejected packet back"),
        }
    }

    #[test]
    fn test_clear_releases_items() {
        let queue = PacketQueue::new(4);
        assert!(queue.push(packet(1), SHORT).is_ok());
        assert!(queue.push(packet(2), SHORT).is_ok());
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop(SHORT).is_none());
    }

    #[test]
    fn test_blocked_producer_wakes_on_eof() {
        let queue = Arc::new(PacketQueue::new(1));
        assert!(queue.push(packet(1), SHORT).is_ok());

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.push(packet(2), Duration::from_secs(5)))
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.signal_eof();
        let result = producer.join().expect("producer thread");
        assert!(result.is_err());
    }
}
