//! In-memory task queue.
//!
//! At-least-once semantics: `ack` deletes, `fail` redelivers until the
//! receive count hits its bound, then the message moves to a dead-letter
//! list. Redelivery is immediate (the production counterpart spaces it by
//! a visibility timeout). Delayed delivery is a min-heap on visibility
//! time, promoted on every lease.

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::QueueError;
use crate::observability::QueueCounts;
use crate::ports::queue::{MessageLease, MessageQueue};

/// Delayed entry for the visibility heap.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct DelayedMessage {
    visible_at: Instant,
    id: u64,
}

impl PartialOrd for DelayedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedMessage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .visible_at
            .cmp(&self.visible_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    body: String,
    receive_count: u32,
    last_error: Option<String>,
}

struct MemoryQueueState {
    /// All live messages (single source of truth).
    messages: HashMap<u64, StoredMessage>,

    /// Visible, ready to lease.
    ready: VecDeque<u64>,

    /// Not yet visible.
    delayed: BinaryHeap<DelayedMessage>,

    /// Leased, waiting for ack/fail.
    in_flight: HashSet<u64>,

    /// Receive bound exceeded.
    dead: Vec<u64>,

    next_id: u64,
    max_receives: u32,
}

impl MemoryQueueState {
    fn new(max_receives: u32) -> Self {
        Self {
            messages: HashMap::new(),
            ready: VecDeque::new(),
            delayed: BinaryHeap::new(),
            in_flight: HashSet::new(),
            dead: Vec::new(),
            next_id: 1,
            max_receives,
        }
    }

    /// Move messages whose visibility time has come into the ready queue.
    fn promote_delayed(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.delayed.peek() {
            if entry.visible_at > now {
                break; // heap is sorted, nothing further is due
            }
            let entry = self.delayed.pop().expect("peeked entry exists");
            self.ready.push_back(entry.id);
        }
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            ready: self.ready.len(),
            delayed: self.delayed.len(),
            in_flight: self.in_flight.len(),
            dead: self.dead.len(),
        }
    }
}

pub struct MemoryQueue {
    state: Arc<Mutex<MemoryQueueState>>,
    notify: Arc<Notify>,
}

impl MemoryQueue {
    pub fn new(max_receives: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryQueueState::new(max_receives))),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Dead-lettered bodies, for tests.
    #[cfg(test)]
    pub async fn dead_letters(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .dead
            .iter()
            .filter_map(|id| state.messages.get(id).map(|m| m.body.clone()))
            .collect()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn enqueue(&self, body: String, delay: Option<Duration>) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock().await;
            let id = state.next_id;
            state.next_id += 1;
            state.messages.insert(
                id,
                StoredMessage {
                    body,
                    receive_count: 0,
                    last_error: None,
                },
            );
            match delay {
                Some(delay) if !delay.is_zero() => {
                    state.delayed.push(DelayedMessage {
                        visible_at: Instant::now() + delay,
                        id,
                    });
                }
                _ => state.ready.push_back(id),
            }
        }
        // 待機中のワーカーに通知（遅延分も lease 側で再計算させる）
        self.notify.notify_one();
        Ok(())
    }

    async fn lease(&self) -> Option<Box<dyn MessageLease>> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_delayed();

                if let Some(id) = state.ready.pop_front() {
                    state.in_flight.insert(id);
                    let message = state.messages.get_mut(&id).expect("ready id is live");
                    message.receive_count += 1;
                    let lease = MemoryLease {
                        id,
                        body: message.body.clone(),
                        receive_count: message.receive_count,
                        state: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                    };
                    return Some(Box::new(lease));
                }

                state.delayed.peek().map(|entry| entry.visible_at)
            };

            // Wait for a notification or for the next delayed message.
            if let Some(wake_at) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = tokio::time::sleep_until(wake_at) => {}
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn counts(&self) -> QueueCounts {
        self.state.lock().await.counts()
    }
}

struct MemoryLease {
    id: u64,
    body: String,
    receive_count: u32,
    state: Arc<Mutex<MemoryQueueState>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl MessageLease for MemoryLease {
    fn body(&self) -> &str {
        &self.body
    }

    fn receive_count(&self) -> u32 {
        self.receive_count
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&self.id);
        state.messages.remove(&self.id);
        Ok(())
    }

    async fn fail(self: Box<Self>, error: String) -> Result<(), QueueError> {
        let redelivered = {
            let mut state = self.state.lock().await;
            state.in_flight.remove(&self.id);

            let Some(message) = state.messages.get_mut(&self.id) else {
                return Ok(());
            };
            message.last_error = Some(error);

            if message.receive_count >= state.max_receives {
                state.dead.push(self.id);
                false
            } else {
                state.ready.push_back(self.id);
                true
            }
        };

        // Notify outside the lock.
        if redelivered {
            self.notify.notify_one();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn lease_now(queue: &MemoryQueue) -> Box<dyn MessageLease> {
        tokio::time::timeout(Duration::from_secs(1), queue.lease())
            .await
            .expect("lease in time")
            .expect("message available")
    }

    #[tokio::test]
    async fn enqueue_lease_ack_deletes() {
        let queue = MemoryQueue::new(3);
        queue.enqueue("m1".to_string(), None).await.unwrap();

        let lease = lease_now(&queue).await;
        assert_eq!(lease.body(), "m1");
        assert_eq!(lease.receive_count(), 1);
        assert_eq!(queue.counts().await.in_flight, 1);

        lease.ack().await.unwrap();
        let counts = queue.counts().await;
        assert_eq!(counts.ready + counts.in_flight + counts.dead, 0);
    }

    #[tokio::test]
    async fn fail_redelivers_with_bumped_receive_count() {
        let queue = MemoryQueue::new(3);
        queue.enqueue("m1".to_string(), None).await.unwrap();

        let lease = lease_now(&queue).await;
        lease.fail("first error".to_string()).await.unwrap();

        let lease = lease_now(&queue).await;
        assert_eq!(lease.body(), "m1");
        assert_eq!(lease.receive_count(), 2);
    }

    #[tokio::test]
    async fn exceeding_receive_bound_dead_letters() {
        let queue = MemoryQueue::new(2);
        queue.enqueue("m1".to_string(), None).await.unwrap();

        for _ in 0..2 {
            let lease = lease_now(&queue).await;
            lease.fail("boom".to_string()).await.unwrap();
        }

        let counts = queue.counts().await;
        assert_eq!(counts.dead, 1);
        assert_eq!(counts.ready, 0);
        assert_eq!(queue.dead_letters().await, vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn delayed_message_is_invisible_until_due() {
        let queue = MemoryQueue::new(3);
        queue
            .enqueue("later".to_string(), Some(Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(queue.counts().await.delayed, 1);
        let leased = tokio::time::timeout(Duration::from_millis(10), queue.lease()).await;
        assert!(leased.is_err(), "message visible too early");

        let lease = lease_now(&queue).await;
        assert_eq!(lease.body(), "later");
    }

    #[tokio::test]
    async fn enqueue_wakes_a_waiting_lease() {
        let queue = Arc::new(MemoryQueue::new(3));

        let waiting = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move {
                let lease = queue.lease().await.expect("message");
                lease.body().to_string()
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue("wake".to_string(), None).await.unwrap();

        let body = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("woken in time")
            .unwrap();
        assert_eq!(body, "wake");
    }
}
