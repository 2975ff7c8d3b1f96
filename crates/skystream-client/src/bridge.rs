//! Push-to-pull bridges.
//!
//! A [`PullQueue`] buffers pushed values until a consumer asks for them. A
//! consumer that asks while the queue is empty parks on a oneshot; the next
//! push hands the value straight to the oldest parked consumer. Finishing the
//! queue drops every parked sender, which wakes those consumers with `None`.
//!
//! Ordering: values are delivered in push order. Buffered values are still
//! drained after `finish()`; only then does `next()` return `None`.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use skystream_core::{ProjectedPost, RawEvent};
use tokio::sync::oneshot;

#[derive(Debug)]
struct QueueState<T> {
    values: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<T>>,
    finished: bool,
}

/// Unbounded single-value-per-pull queue with parked consumers.
#[derive(Debug)]
pub struct PullQueue<T> {
    state: Mutex<QueueState<T>>,
}

impl<T> Default for PullQueue<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                values: VecDeque::new(),
                waiters: VecDeque::new(),
                finished: false,
            }),
        }
    }
}

impl<T> PullQueue<T> {
    /// Create an open, empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `value` to the oldest parked consumer, or buffer it.
    ///
    /// Returns `false` once the queue is finished.
    pub fn push(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if state.finished {
            return false;
        }
        let mut value = value;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(value) {
                Ok(()) => return true,
                // Consumer went away; try the next one.
                Err(returned) => value = returned,
            }
        }
        state.values.push_back(value);
        true
    }

    /// Next value, or `None` once finished and drained.
    pub async fn next(&self) -> Option<T> {
        let rx = {
            let mut state = self.state.lock();
            if let Some(value) = state.values.pop_front() {
                return Some(value);
            }
            if state.finished {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };
        rx.await.ok()
    }

    /// Stop accepting values and wake every parked consumer with `None`.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        state.finished = true;
        state.waiters.clear();
    }

    /// Whether [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Buffered value count.
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.state.lock().values.is_empty()
    }

    /// Parked consumer count.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

/// Weak set of queues fed from one source.
///
/// Holds queues weakly so a dropped stream unregisters itself.
#[derive(Debug)]
pub struct QueueSet<T> {
    queues: Mutex<Vec<Weak<PullQueue<T>>>>,
}

impl<T> Default for QueueSet<T> {
    fn default() -> Self {
        Self {
            queues: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> QueueSet<T> {
    /// Create and register a fresh queue.
    pub fn register(&self) -> Arc<PullQueue<T>> {
        let queue = Arc::new(PullQueue::new());
        self.queues.lock().push(Arc::downgrade(&queue));
        queue
    }

    /// Push a clone of `value` into every live queue. Returns receivers reached.
    pub fn broadcast(&self, value: &T) -> usize {
        let live: Vec<Arc<PullQueue<T>>> = {
            let mut queues = self.queues.lock();
            queues.retain(|weak| weak.strong_count() > 0);
            queues.iter().filter_map(Weak::upgrade).collect()
        };
        live.iter()
            .filter(|queue| queue.push(value.clone()))
            .count()
    }

    /// Finish every live queue and forget them.
    pub fn finish_all(&self) {
        let drained: Vec<Weak<PullQueue<T>>> = std::mem::take(&mut *self.queues.lock());
        for queue in drained.iter().filter_map(Weak::upgrade) {
            queue.finish();
        }
    }

    /// Live queue count.
    pub fn len(&self) -> usize {
        self.queues
            .lock()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether no live queue is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bridges owned by one client.
#[derive(Debug, Default)]
pub struct BridgeRegistry {
    /// Post streams, including the mention filter's inner stream.
    pub posts: QueueSet<ProjectedPost>,
    /// Per-account streams.
    pub accounts: QueueSet<RawEvent>,
}

impl BridgeRegistry {
    /// Finish every bridge. Used on disconnect and terminal loss.
    pub fn finish_all(&self) {
        self.posts.finish_all();
        self.accounts.finish_all();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn buffered_values_come_out_in_order() {
        let queue = PullQueue::new();
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next().await, Some(1));
        assert_eq!(queue.next().await, Some(2));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn parked_consumer_receives_next_push() {
        let queue = Arc::new(PullQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await })
        };
        while queue.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(queue.push("hello"));
        assert_eq!(consumer.await.unwrap(), Some("hello"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn finish_wakes_every_parked_consumer() {
        let queue = Arc::new(PullQueue::<u32>::new());
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.next().await })
            })
            .collect();
        while queue.waiting() < 3 {
            tokio::task::yield_now().await;
        }
        queue.finish();
        for consumer in consumers {
            let got = tokio::time::timeout(Duration::from_secs(1), consumer)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, None);
        }
    }

    #[tokio::test]
    async fn finish_drains_buffer_before_none() {
        let queue = PullQueue::new();
        assert!(queue.push(7));
        queue.finish();
        assert!(!queue.push(8));
        assert_eq!(queue.next().await, Some(7));
        assert_eq!(queue.next().await, None);
        assert!(queue.is_finished());
    }

    #[tokio::test]
    async fn dropped_consumer_does_not_lose_value() {
        let queue = Arc::new(PullQueue::new());
        {
            let waiter = queue.next();
            // Poll once so the waiter parks, then drop it.
            let _ = tokio::time::timeout(Duration::from_millis(5), waiter).await;
        }
        assert_eq!(queue.waiting(), 1);
        assert!(queue.push(42));
        assert_eq!(queue.waiting(), 0);
        assert_eq!(queue.next().await, Some(42));
    }

    #[tokio::test]
    async fn queue_set_broadcasts_to_live_queues() {
        let set = QueueSet::default();
        let a = set.register();
        let b = set.register();
        assert_eq!(set.broadcast(&"x"), 2);
        drop(b);
        assert_eq!(set.broadcast(&"y"), 1);
        assert_eq!(set.len(), 1);
        assert_eq!(a.next().await, Some("x"));
        assert_eq!(a.next().await, Some("y"));
    }

    #[tokio::test]
    async fn queue_set_finish_all() {
        let set = QueueSet::<u8>::default();
        let a = set.register();
        set.finish_all();
        assert!(a.is_finished());
        assert!(set.is_empty());
        assert_eq!(set.broadcast(&1), 0);
        assert_eq!(a.next().await, None);
    }
}
