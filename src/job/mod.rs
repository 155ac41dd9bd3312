//! Job record and state machine.
//!
//! A job tracks one document's translation request from ingress to a
//! terminal state. The Job Store is the single source of truth; queue
//! messages are hints. Transitions are monotonic — no state is revisited
//! and terminal states are final.

pub mod store;

pub use store::*;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Lifecycle states of a translation job.
///
/// Legal orderings:
/// `RECEIVED → EXTRACTED → (MODERATION_FAILED | TRANSLATING → (COMPLETED | FAILED))`,
/// plus `FAILED` from any non-terminal state for unextractable documents
/// and messages that exhaust their redelivery budget. `TRANSLATING` may
/// repeat when a delivery retries a crashed translation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Received,
    Extracted,
    ModerationFailed,
    Translating,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Extracted => "EXTRACTED",
            Self::ModerationFailed => "MODERATION_FAILED",
            Self::Translating => "TRANSLATING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RECEIVED" => Some(Self::Received),
            "EXTRACTED" => Some(Self::Extracted),
            "MODERATION_FAILED" => Some(Self::ModerationFailed),
            "TRANSLATING" => Some(Self::Translating),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ModerationFailed | Self::Completed | Self::Failed)
    }

    /// Whether a forward transition to `next` is legal.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        use JobState::*;
        match self {
            Received => matches!(next, Extracted | Failed),
            Extracted => matches!(next, ModerationFailed | Translating | Failed),
            Translating => matches!(next, Translating | Completed | Failed),
            ModerationFailed | Completed | Failed => false,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One document's translation request.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub blob_key: String,
    pub source_language: String,
    pub target_language: String,
    pub state: JobState,
    /// Translation attempts started so far.
    pub attempt: u32,
    /// Set iff `state == COMPLETED`.
    pub result_text: Option<String>,
    /// Set when `state` is `MODERATION_FAILED` or `FAILED`.
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// A freshly ingressed job in `RECEIVED`.
    pub fn received(
        job_id: &str,
        blob_key: &str,
        source_language: &str,
        target_language: &str,
    ) -> Self {
        let now = now_utc();
        Self {
            job_id: job_id.to_string(),
            blob_key: blob_key.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            state: JobState::Received,
            attempt: 0,
            result_text: None,
            failure_reason: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Current UTC timestamp in the store's canonical format.
pub(crate) fn now_utc() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
