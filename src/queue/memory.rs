//! In-process job queue with SQS-like delivery semantics.
//!
//! Backs embedded deployments and tests. Messages become invisible for the
//! visibility timeout on each delivery and reappear if not acknowledged;
//! long poll blocks on a condvar until a message is available or the wait
//! elapses.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::{JobQueue, QueueError, QueueMessage};

#[derive(Debug, Clone)]
struct Entry {
    message_id: String,
    body: String,
    receive_count: u32,
    visible_at: Instant,
    /// Receipt of the most recent delivery; invalidated on redelivery.
    receipt: Option<String>,
}

/// A message that exceeded its redelivery budget.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message_id: String,
    pub body: String,
    pub receive_count: u32,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    dead: Vec<DeadLetter>,
}

pub struct MemoryJobQueue {
    inner: Mutex<Inner>,
    available: Condvar,
    visibility: Duration,
}

impl MemoryJobQueue {
    pub fn new(visibility: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            available: Condvar::new(),
            visibility,
        }
    }

    /// Enqueue a message body. Returns the assigned message id.
    pub fn send(&self, body: impl Into<String>) -> String {
        let message_id = Uuid::new_v4().to_string();
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.entries.push(Entry {
            message_id: message_id.clone(),
            body: body.into(),
            receive_count: 0,
            visible_at: Instant::now(),
            receipt: None,
        });
        self.available.notify_all();
        message_id
    }

    /// Messages still in circulation (visible or in flight).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages moved to the dead-letter path.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.lock().expect("queue lock poisoned").dead.clone()
    }
}

impl JobQueue for MemoryJobQueue {
    fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| QueueError::Unavailable("queue lock poisoned".into()))?;

        loop {
            let now = Instant::now();
            let mut batch = Vec::new();

            for entry in inner.entries.iter_mut() {
                if batch.len() >= max {
                    break;
                }
                if entry.visible_at <= now {
                    entry.receive_count += 1;
                    entry.visible_at = now + self.visibility;
                    let receipt = Uuid::new_v4().to_string();
                    entry.receipt = Some(receipt.clone());
                    batch.push(QueueMessage {
                        message_id: entry.message_id.clone(),
                        receipt,
                        body: entry.body.clone(),
                        receive_count: entry.receive_count,
                    });
                }
            }

            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            // Wake early when a send lands, or when the next invisible
            // message may have become visible again.
            let next_visible = inner
                .entries
                .iter()
                .map(|e| e.visible_at)
                .min()
                .unwrap_or(deadline);
            let wake_at = next_visible.min(deadline);
            let timeout = wake_at.saturating_duration_since(now);

            let (guard, _) = self
                .available
                .wait_timeout(inner, timeout.max(Duration::from_millis(1)))
                .map_err(|_| QueueError::Unavailable("queue lock poisoned".into()))?;
            inner = guard;
        }
    }

    fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| QueueError::Unavailable("queue lock poisoned".into()))?;

        let before = inner.entries.len();
        inner
            .entries
            .retain(|e| e.receipt.as_deref() != Some(receipt));

        if inner.entries.len() == before {
            return Err(QueueError::UnknownReceipt(receipt.to_string()));
        }
        Ok(())
    }

    fn dead_letter(&self, receipt: &str) -> Result<(), QueueError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| QueueError::Unavailable("queue lock poisoned".into()))?;

        let pos = inner
            .entries
            .iter()
            .position(|e| e.receipt.as_deref() == Some(receipt))
            .ok_or_else(|| QueueError::UnknownReceipt(receipt.to_string()))?;

        let entry = inner.entries.remove(pos);
        inner.dead.push(DeadLetter {
            message_id: entry.message_id,
            body: entry.body,
            receive_count: entry.receive_count,
        });
        Ok(())
    }
}
