//! Per-connection outbound queue.
//!
//! Grounded on the teacher's `connection_pool.rs` send-queue, but replaces
//! its `Semaphore`-backed blocking pool with drop-oldest eviction: the room
//! writer must never wait on a slow peer, so a full queue sheds the oldest
//! best-effort entry instead of applying backpressure to the sender.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Critical messages (acks, sync state, authoritative undo/redo/clear,
/// membership changes) are never evicted. Best-effort messages (in-progress
/// draw batches, cursor moves) are dropped oldest-first once the queue is at
/// capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Critical,
    BestEffort,
}

struct Entry {
    payload: String,
    priority: Priority,
}

pub struct OutboundQueue {
    entries: Mutex<VecDeque<Entry>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push_critical(&self, payload: String) {
        self.entries.lock().push_back(Entry { payload, priority: Priority::Critical });
        self.notify.notify_one();
    }

    /// Enqueues a best-effort message, evicting the oldest best-effort entry
    /// first if the queue already holds `capacity` of them. Critical entries
    /// already queued are never touched by this eviction. Returns `true` if
    /// an entry was evicted to make room, so the caller can surface it on
    /// the drop counter.
    pub fn push_best_effort(&self, payload: String) -> bool {
        let mut entries = self.entries.lock();
        let best_effort_count = entries.iter().filter(|e| e.priority == Priority::BestEffort).count();
        let mut evicted = false;
        if best_effort_count >= self.capacity {
            if let Some(pos) = entries.iter().position(|e| e.priority == Priority::BestEffort) {
                entries.remove(pos);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                evicted = true;
            }
        }
        entries.push_back(Entry { payload, priority: Priority::BestEffort });
        drop(entries);
        self.notify.notify_one();
        evicted
    }

    /// Returns `true` if enqueuing this message evicted an older best-effort
    /// entry (always `false` for `Priority::Critical`).
    pub fn push(&self, payload: String, priority: Priority) -> bool {
        match priority {
            Priority::Critical => {
                self.push_critical(payload);
                false
            }
            Priority::BestEffort => self.push_best_effort(payload),
        }
    }

    /// Waits for and returns the next queued payload, or `None` once the
    /// queue has been closed and drained.
    pub async fn recv(&self) -> Option<String> {
        loop {
            if let Some(entry) = self.entries.lock().pop_front() {
                return Some(entry.payload);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn best_effort_evicts_oldest_once_at_capacity() {
        let queue = OutboundQueue::new(2);
        queue.push_best_effort("a".into());
        queue.push_best_effort("b".into());
        queue.push_best_effort("c".into());

        assert_eq!(queue.recv().await, Some("b".to_string()));
        assert_eq!(queue.recv().await, Some("c".to_string()));
        assert_eq!(queue.dropped_count(), 1);
    }

    #[tokio::test]
    async fn critical_never_evicted_by_best_effort_overflow() {
        let queue = OutboundQueue::new(1);
        queue.push_critical("keep-me".into());
        queue.push_best_effort("a".into());
        queue.push_best_effort("b".into());

        assert_eq!(queue.recv().await, Some("keep-me".to_string()));
        assert_eq!(queue.recv().await, Some("b".to_string()));
        assert_eq!(queue.dropped_count(), 1);
    }

    #[tokio::test]
    async fn close_unblocks_pending_recv_with_none() {
        let queue = std::sync::Arc::new(OutboundQueue::new(4));
        let q2 = queue.clone();
        let handle = tokio::spawn(async move { q2.recv().await });
        tokio::task::yield_now().await;
        queue.close();
        assert_eq!(handle.await.unwrap(), None);
    }
}
