//! Job queue contract — the pipeline's input.
//!
//! Models the semantics the worker requires of the external queue:
//! at-least-once delivery, visibility timeout with redelivery on
//! non-acknowledgment, batch receive with a max wait (long poll), and a
//! dead-letter path for poison messages. An SQS-class queue satisfies this
//! contract in production; [`memory::MemoryJobQueue`] serves embedded
//! deployments and tests.

pub mod memory;

pub use memory::MemoryJobQueue;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown or expired receipt: {0}")]
    UnknownReceipt(String),
}

/// Schema of the ingress message enqueued per upload (JSON, UTF-8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub job_id: String,
    pub blob_key: String,
    pub target_language: String,
    /// Optional; the worker falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
}

impl JobMessage {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// A delivered message. The receipt identifies this delivery for
/// acknowledgment; it expires once the visibility timeout lapses.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt: String,
    pub body: String,
    /// How many times this message has been delivered, this one included.
    pub receive_count: u32,
}

/// Queue operations the pipeline worker depends on.
pub trait JobQueue: Send + Sync {
    /// Pull up to `max` messages, blocking up to `wait` for at least one.
    /// Returns an empty batch on timeout. Delivered messages become
    /// invisible until acknowledged or the visibility timeout lapses.
    fn receive(&self, max: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge a delivery: the message will never be redelivered.
    fn delete(&self, receipt: &str) -> Result<(), QueueError>;

    /// Remove a message from circulation onto the dead-letter path.
    fn dead_letter(&self, receipt: &str) -> Result<(), QueueError>;
}
