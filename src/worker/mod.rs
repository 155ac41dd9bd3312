//! Job pipeline worker — the orchestrator.
//!
//! Polls the queue, decodes job messages, and drives each job through
//! fetch+decrypt → extract → moderate → translate, persisting every state
//! transition before the corresponding queue message is deleted. Duplicate
//! deliveries of terminal jobs are acknowledged without writes; retryable
//! failures leave the message unacknowledged for redelivery after the
//! queue's visibility timeout.

pub mod pool;

pub use pool::{start_worker_pool, WorkerPoolHandle};

use std::sync::Arc;

use thiserror::Error;

use crate::blob::BlobStore;
use crate::config::PipelineConfig;
use crate::crypto::{DocumentKey, EncryptedBlob};
use crate::db::DatabaseError;
use crate::extract::{extract_text, PlainTextExtractor, TextExtractor};
use crate::job::{Job, JobState, JobStore, JobUpdate, Transition};
use crate::moderation::ModerationGate;
use crate::queue::{JobMessage, JobQueue, QueueError, QueueMessage};
use crate::translate::TranslationClient;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// What to do with a message after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Processing reached a durable outcome; delete the message.
    Ack,
    /// Transient failure; leave the message for redelivery.
    Retry,
    /// Redelivery budget exhausted; move the message out of circulation.
    DeadLetter,
}

/// A step failed for a reason worth redelivering the message over.
struct RetryLater(String);

impl From<DatabaseError> for RetryLater {
    fn from(e: DatabaseError) -> Self {
        RetryLater(format!("job store: {e}"))
    }
}

/// Per-batch accounting, for the hosting process's logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchOutcome {
    pub received: usize,
    pub acked: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

/// The queue-driven pipeline worker. All collaborators are injected;
/// per-job serialization is enforced by the job store's conditional
/// transitions, so any number of workers may share the same stores.
pub struct PipelineWorker {
    queue: Arc<dyn JobQueue>,
    jobs: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
    key: Arc<DocumentKey>,
    extractors: Vec<Box<dyn TextExtractor>>,
    gate: Box<dyn ModerationGate>,
    translator: Box<dyn TranslationClient>,
    config: PipelineConfig,
}

impl PipelineWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        jobs: Arc<dyn JobStore>,
        blobs: Arc<dyn BlobStore>,
        key: Arc<DocumentKey>,
        gate: Box<dyn ModerationGate>,
        translator: Box<dyn TranslationClient>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            queue,
            jobs,
            blobs,
            key,
            extractors: vec![Box::new(PlainTextExtractor)],
            gate,
            translator,
            config,
        }
    }

    /// Replace the extraction backends (e.g. to register a PDF renderer).
    pub fn with_extractors(mut self, extractors: Vec<Box<dyn TextExtractor>>) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pull one batch and process each message independently. Blocks up to
    /// the configured poll wait when the queue is empty.
    pub fn poll_and_process(&self) -> Result<BatchOutcome, PipelineError> {
        let batch = self
            .queue
            .receive(self.config.batch_size, self.config.poll_wait())?;

        let mut outcome = BatchOutcome {
            received: batch.len(),
            ..Default::default()
        };

        for message in &batch {
            match self.process_message(message) {
                Disposition::Ack => {
                    // State is durable; deleting last guarantees
                    // at-least-once never loses a recorded outcome.
                    match self.queue.delete(&message.receipt) {
                        Ok(()) => outcome.acked += 1,
                        Err(e) => {
                            tracing::warn!(message_id = %message.message_id, error = %e,
                                "Failed to delete message; terminal-state check will absorb the redelivery");
                            outcome.retried += 1;
                        }
                    }
                }
                Disposition::Retry => outcome.retried += 1,
                Disposition::DeadLetter => match self.queue.dead_letter(&message.receipt) {
                    Ok(()) => outcome.dead_lettered += 1,
                    Err(e) => {
                        tracing::warn!(message_id = %message.message_id, error = %e,
                            "Failed to dead-letter message");
                        outcome.retried += 1;
                    }
                },
            }
        }

        Ok(outcome)
    }

    fn process_message(&self, message: &QueueMessage) -> Disposition {
        let parsed = match JobMessage::parse(&message.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(message_id = %message.message_id, error = %e,
                    "Malformed job message, dropping");
                return Disposition::Ack;
            }
        };

        if message.receive_count > self.config.max_receives {
            return self.handle_poison(&parsed, message);
        }

        match self.run_job(&parsed) {
            Ok(()) => Disposition::Ack,
            Err(RetryLater(reason)) => {
                tracing::warn!(job_id = %parsed.job_id, reason,
                    "Retryable failure; leaving message for redelivery");
                Disposition::Retry
            }
        }
    }

    /// Drive one job as far as it can go. Non-retryable failures are
    /// recorded on the job and yield `Ok` so the message is acknowledged;
    /// only transient failures return `RetryLater`.
    fn run_job(&self, msg: &JobMessage) -> Result<(), RetryLater> {
        let job = self.load_or_create(msg)?;

        if job.state.is_terminal() {
            tracing::info!(job_id = %job.job_id, state = %job.state,
                "Duplicate delivery for terminal job, acknowledging");
            return Ok(());
        }

        // Fetch + decrypt. Store or key trouble is transient; the blob
        // itself does not change, so redelivery is the right recovery.
        let sealed_bytes = self
            .blobs
            .get(&job.blob_key)
            .map_err(|e| RetryLater(format!("blob fetch: {e}")))?;
        let sealed = EncryptedBlob::from_bytes(&sealed_bytes)
            .map_err(|e| RetryLater(format!("blob decode: {e}")))?;
        let plaintext = self
            .key
            .decrypt(&sealed)
            .map_err(|e| RetryLater(format!("blob decrypt: {e}")))?;

        // Extract. Corrupt or unsupported content never improves on retry.
        let text = match extract_text(&self.extractors, &plaintext) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, error = %e, "Extraction failed");
                self.jobs.transition(
                    &job.job_id,
                    &[job.state],
                    JobState::Failed,
                    JobUpdate::failed(format!("extraction failed: {e}")),
                )?;
                return Ok(());
            }
        };

        if job.state == JobState::Received {
            // Conflict is benign: another delivery got there first.
            self.jobs.transition(
                &job.job_id,
                &[JobState::Received],
                JobState::Extracted,
                JobUpdate::none(),
            )?;
        }

        // Re-read: the record is authoritative, not our stale copy.
        let job = self
            .jobs
            .get(&job.job_id)?
            .ok_or_else(|| RetryLater("job record vanished".to_string()))?;
        if job.state.is_terminal() {
            return Ok(());
        }

        // Moderation gate. A job already in TRANSLATING passed it before.
        if job.state == JobState::Extracted && !self.gate.is_allowed(&text) {
            tracing::warn!(job_id = %job.job_id, "Content moderation rejected document");
            self.jobs.transition(
                &job.job_id,
                &[JobState::Extracted],
                JobState::ModerationFailed,
                JobUpdate::failed("content moderation rejected".to_string()),
            )?;
            return Ok(());
        }

        // Claim the translation attempt before calling out.
        let claimed = self.jobs.transition(
            &job.job_id,
            &[JobState::Extracted, JobState::Translating],
            JobState::Translating,
            JobUpdate {
                bump_attempt: true,
                ..JobUpdate::none()
            },
        )?;
        if claimed == Transition::Conflict {
            let current = self.jobs.get(&job.job_id)?;
            if current.map(|j| j.state.is_terminal()).unwrap_or(false) {
                return Ok(());
            }
            return Err(RetryLater("lost translation claim".to_string()));
        }

        tracing::info!(job_id = %job.job_id, source = %job.source_language,
            target = %job.target_language, "Translating document");

        match self
            .translator
            .translate(&text, &job.source_language, &job.target_language)
        {
            Ok(result) if !result.trim().is_empty() => {
                self.jobs.transition(
                    &job.job_id,
                    &[JobState::Translating],
                    JobState::Completed,
                    JobUpdate::completed(result),
                )?;
                tracing::info!(job_id = %job.job_id, "Job completed");
                Ok(())
            }
            Ok(_) => {
                self.jobs.transition(
                    &job.job_id,
                    &[JobState::Translating],
                    JobState::Failed,
                    JobUpdate::failed("translation produced empty result".to_string()),
                )?;
                Ok(())
            }
            Err(e) => {
                // Rejections and exhausted budgets are both terminal; the
                // client already spent its internal retries.
                tracing::warn!(job_id = %job.job_id, error = %e, "Translation failed");
                self.jobs.transition(
                    &job.job_id,
                    &[JobState::Translating],
                    JobState::Failed,
                    JobUpdate::failed(e.to_string()),
                )?;
                Ok(())
            }
        }
    }

    fn load_or_create(&self, msg: &JobMessage) -> Result<Job, RetryLater> {
        if let Some(job) = self.jobs.get(&msg.job_id)? {
            return Ok(job);
        }

        let source = msg
            .source_language
            .clone()
            .unwrap_or_else(|| self.config.default_source_language.clone());
        let job = Job::received(&msg.job_id, &msg.blob_key, &source, &msg.target_language);

        if self.jobs.create(&job)? {
            tracing::info!(job_id = %job.job_id, blob_key = %job.blob_key,
                target = %job.target_language, "Created job record");
            Ok(job)
        } else {
            // Raced with another delivery; its record wins.
            self.jobs
                .get(&msg.job_id)?
                .ok_or_else(|| RetryLater("job record vanished".to_string()))
        }
    }

    /// A message past its redelivery budget: force-fail the job so no
    /// poison message is reprocessed forever, then dead-letter it. If the
    /// job store is unavailable the message is kept in circulation so the
    /// force-fail is retried on the next delivery.
    fn handle_poison(&self, msg: &JobMessage, message: &QueueMessage) -> Disposition {
        tracing::error!(job_id = %msg.job_id, receive_count = message.receive_count,
            "Redelivery budget exhausted, dead-lettering message");

        match self.jobs.get(&msg.job_id) {
            Ok(Some(job)) if !job.state.is_terminal() => {
                let result = self.jobs.transition(
                    &job.job_id,
                    &[job.state],
                    JobState::Failed,
                    JobUpdate::failed(format!(
                        "redelivery budget exhausted after {} deliveries",
                        message.receive_count
                    )),
                );
                if let Err(e) = result {
                    tracing::warn!(job_id = %job.job_id, error = %e,
                        "Could not record dead-letter failure on job, retrying");
                    return Disposition::Retry;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(job_id = %msg.job_id, error = %e,
                    "Job store unavailable while dead-lettering, retrying");
                return Disposition::Retry;
            }
        }

        Disposition::DeadLetter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::blob::FsBlobStore;
    use crate::db::open_memory_database;
    use crate::job::SqliteJobStore;
    use crate::moderation::DenylistGate;
    use crate::queue::MemoryJobQueue;
    use crate::translate::TranslateError;

    /// Trait-level translation mock: scripted responses, call counting.
    struct MockTranslator {
        responses: Mutex<Vec<Result<String, TranslateError>>>,
        calls: AtomicU32,
    }

    impl MockTranslator {
        fn always(response: &str) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(response.to_string())]),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(error: TranslateError) -> Self {
            Self {
                responses: Mutex::new(vec![Err(error)]),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl TranslationClient for MockTranslator {
        fn translate(&self, _t: &str, _s: &str, _l: &str) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().last().unwrap().clone()
        }
    }

    /// Job store spy: counts writes, for idempotence assertions.
    struct SpyStore {
        inner: SqliteJobStore,
        writes: AtomicU32,
    }

    impl SpyStore {
        fn new() -> Self {
            Self {
                inner: SqliteJobStore::new(open_memory_database().unwrap()),
                writes: AtomicU32::new(0),
            }
        }
    }

    impl JobStore for SpyStore {
        fn get(&self, job_id: &str) -> Result<Option<Job>, DatabaseError> {
            self.inner.get(job_id)
        }
        fn create(&self, job: &Job) -> Result<bool, DatabaseError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.create(job)
        }
        fn transition(
            &self,
            job_id: &str,
            expected: &[JobState],
            new_state: JobState,
            update: JobUpdate,
        ) -> Result<Transition, DatabaseError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.transition(job_id, expected, new_state, update)
        }
    }

    /// Store whose lock is permanently poisoned, as after a worker panic.
    struct PoisonedStore;

    impl JobStore for PoisonedStore {
        fn get(&self, _job_id: &str) -> Result<Option<Job>, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }
        fn create(&self, _job: &Job) -> Result<bool, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }
        fn transition(
            &self,
            _job_id: &str,
            _expected: &[JobState],
            _new_state: JobState,
            _update: JobUpdate,
        ) -> Result<Transition, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }
    }

    struct Harness {
        queue: Arc<MemoryJobQueue>,
        jobs: Arc<SpyStore>,
        blobs: Arc<FsBlobStore>,
        key: Arc<DocumentKey>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            // Generous visibility so receipts never expire mid-test.
            Self::with_visibility(Duration::from_secs(5))
        }

        fn with_visibility(visibility: Duration) -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                queue: Arc::new(MemoryJobQueue::new(visibility)),
                jobs: Arc::new(SpyStore::new()),
                blobs: Arc::new(FsBlobStore::new(dir.path())),
                key: Arc::new(DocumentKey::generate()),
                _dir: dir,
            }
        }

        fn worker(&self, translator: Box<dyn TranslationClient>) -> PipelineWorker {
            self.worker_with_config(translator, self.config())
        }

        fn worker_with_config(
            &self,
            translator: Box<dyn TranslationClient>,
            config: PipelineConfig,
        ) -> PipelineWorker {
            PipelineWorker::new(
                self.queue.clone(),
                self.jobs.clone(),
                self.blobs.clone(),
                self.key.clone(),
                Box::new(DenylistGate::new(&["bannedword1", "bannedword2"])),
                translator,
                config,
            )
        }

        fn config(&self) -> PipelineConfig {
            PipelineConfig {
                poll_wait_secs: 0,
                ..PipelineConfig::default()
            }
        }

        /// Seal plaintext under the pipeline key and store it.
        fn upload(&self, blob_key: &str, plaintext: &[u8]) {
            let sealed = self.key.encrypt(plaintext).unwrap();
            self.blobs.put(blob_key, &sealed.to_bytes()).unwrap();
        }

        fn enqueue(&self, job_id: &str, blob_key: &str, target: &str) {
            let body = serde_json::to_string(&JobMessage {
                job_id: job_id.into(),
                blob_key: blob_key.into(),
                target_language: target.into(),
                source_language: None,
            })
            .unwrap();
            self.queue.send(body);
        }

        fn job(&self, job_id: &str) -> Job {
            self.jobs.get(job_id).unwrap().unwrap()
        }
    }

    #[test]
    fn happy_path_completes_job() {
        let h = Harness::new();
        h.upload("b1", b"hello world");
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("bonjour le monde")));
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.received, 1);
        assert_eq!(outcome.acked, 1);
        assert!(h.queue.is_empty());

        let job = h.job("J1");
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.result_text.as_deref(), Some("bonjour le monde"));
        assert_eq!(job.attempt, 1);
        assert_eq!(job.source_language, "en"); // configured default
        assert!(job.failure_reason.is_none());
    }

    #[test]
    fn denylisted_document_never_reaches_translator() {
        let h = Harness::new();
        h.upload("b1", b"this mentions bannedword1 explicitly");
        h.enqueue("J1", "b1", "fr");

        let translator = Arc::new(MockTranslator::always("unused"));
        let worker = PipelineWorker::new(
            h.queue.clone(),
            h.jobs.clone(),
            h.blobs.clone(),
            h.key.clone(),
            Box::new(DenylistGate::new(&["bannedword1"])),
            Box::new(SharedTranslator(translator.clone())),
            h.config(),
        );

        worker.poll_and_process().unwrap();

        let job = h.job("J1");
        assert_eq!(job.state, JobState::ModerationFailed);
        assert!(job.result_text.is_none());
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
        assert!(h.queue.is_empty());
    }

    /// Forwarding wrapper so a test can keep a handle on the mock.
    struct SharedTranslator(Arc<MockTranslator>);
    impl TranslationClient for SharedTranslator {
        fn translate(&self, t: &str, s: &str, l: &str) -> Result<String, TranslateError> {
            self.0.translate(t, s, l)
        }
    }

    #[test]
    fn duplicate_delivery_after_completion_writes_nothing() {
        let h = Harness::new();
        h.upload("b1", b"hello world");
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("bonjour le monde")));
        worker.poll_and_process().unwrap();
        assert_eq!(h.job("J1").state, JobState::Completed);

        let writes_before = h.jobs.writes.load(Ordering::SeqCst);

        // Redeliver the same message.
        h.enqueue("J1", "b1", "fr");
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.acked, 1, "duplicate must still be acknowledged");
        assert!(h.queue.is_empty());
        assert_eq!(
            h.jobs.writes.load(Ordering::SeqCst),
            writes_before,
            "terminal job must not be written"
        );
        assert_eq!(h.job("J1").result_text.as_deref(), Some("bonjour le monde"));
    }

    #[test]
    fn malformed_message_dropped_without_affecting_batch() {
        let h = Harness::new();
        h.upload("b1", b"hello world");
        h.queue.send("{not valid json");
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("bonjour le monde")));
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.received, 2);
        assert_eq!(outcome.acked, 2);
        assert!(h.queue.is_empty());
        assert_eq!(h.job("J1").state, JobState::Completed);
    }

    #[test]
    fn missing_blob_leaves_message_for_redelivery() {
        let h = Harness::new();
        h.enqueue("J1", "nonexistent", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("unused")));
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.retried, 1);
        assert_eq!(h.queue.len(), 1, "message stays in circulation");
        // Job exists but has not advanced past RECEIVED.
        assert_eq!(h.job("J1").state, JobState::Received);
    }

    #[test]
    fn undecryptable_blob_is_retryable() {
        let h = Harness::new();
        // Stored bytes are not a valid sealed blob at all.
        h.blobs.put("b1", b"garbage, too short").unwrap();
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("unused")));
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.retried, 1);
        assert_eq!(h.job("J1").state, JobState::Received);
    }

    #[test]
    fn unextractable_document_fails_terminally() {
        let h = Harness::new();
        // Valid encryption, but the plaintext is an unsupported binary format.
        h.upload("b1", &[0xFF, 0xFE, 0x01, 0x80, 0x00]);
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("unused")));
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.acked, 1);
        assert!(h.queue.is_empty(), "non-retryable failure must not redeliver");

        let job = h.job("J1");
        assert_eq!(job.state, JobState::Failed);
        assert!(job.failure_reason.as_deref().unwrap().contains("extraction"));
        assert!(job.result_text.is_none());
    }

    #[test]
    fn translation_rejection_fails_job_terminally() {
        let h = Harness::new();
        h.upload("b1", b"hello world");
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::failing(TranslateError::Rejected {
            status: 400,
            body: "unsupported language pair".to_string(),
        })));
        worker.poll_and_process().unwrap();

        let job = h.job("J1");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempt, 1);
        assert!(job.failure_reason.as_deref().unwrap().contains("400"));
        assert!(h.queue.is_empty());
    }

    #[test]
    fn exhausted_translation_budget_fails_job_terminally() {
        let h = Harness::new();
        h.upload("b1", b"hello world");
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::failing(
            TranslateError::RetriesExhausted {
                retries: 3,
                last: "HTTP 503".to_string(),
            },
        )));
        worker.poll_and_process().unwrap();

        let job = h.job("J1");
        assert_eq!(job.state, JobState::Failed);
        assert!(h.queue.is_empty(), "exhausted budget must not requeue");
    }

    #[test]
    fn explicit_source_language_overrides_default() {
        let h = Harness::new();
        h.upload("b1", b"hola mundo");
        let body = r#"{"jobId":"J1","blobKey":"b1","targetLanguage":"fr","sourceLanguage":"es"}"#;
        h.queue.send(body);

        let worker = h.worker(Box::new(MockTranslator::always("bonjour le monde")));
        worker.poll_and_process().unwrap();

        assert_eq!(h.job("J1").source_language, "es");
    }

    #[test]
    fn poison_message_dead_letters_and_fails_job() {
        let h = Harness::with_visibility(Duration::from_millis(30));
        // Blob never appears, so every delivery is a retryable failure.
        h.enqueue("J1", "never-uploaded", "fr");

        let config = PipelineConfig {
            poll_wait_secs: 0,
            max_receives: 2,
            ..PipelineConfig::default()
        };
        let worker = h.worker_with_config(Box::new(MockTranslator::always("unused")), config);

        // Deliveries 1 and 2: retried. Delivery 3 exceeds the budget.
        for _ in 0..3 {
            worker.poll_and_process().unwrap();
            std::thread::sleep(Duration::from_millis(40)); // let visibility lapse
        }

        let dead = h.queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].receive_count, 3);
        assert!(h.queue.is_empty());

        let job = h.job("J1");
        assert_eq!(job.state, JobState::Failed);
        assert!(job
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("redelivery budget"));
    }

    #[test]
    fn store_failure_leaves_message_for_redelivery() {
        let h = Harness::new();
        h.upload("b1", b"hello world");
        h.enqueue("J1", "b1", "fr");

        let worker = PipelineWorker::new(
            h.queue.clone(),
            Arc::new(PoisonedStore),
            h.blobs.clone(),
            h.key.clone(),
            Box::new(DenylistGate::allow_all()),
            Box::new(MockTranslator::always("unused")),
            h.config(),
        );
        let outcome = worker.poll_and_process().unwrap();

        // The store error surfaces as a retryable failure, not a panic.
        assert_eq!(outcome.retried, 1);
        assert_eq!(h.queue.len(), 1);
    }

    #[test]
    fn poison_handling_retries_when_store_is_down() {
        let h = Harness::new();
        h.enqueue("J1", "b1", "fr");

        // Every delivery is over budget, but the force-fail cannot be
        // recorded, so the message must stay in circulation.
        let config = PipelineConfig {
            poll_wait_secs: 0,
            max_receives: 0,
            ..PipelineConfig::default()
        };
        let worker = PipelineWorker::new(
            h.queue.clone(),
            Arc::new(PoisonedStore),
            h.blobs.clone(),
            h.key.clone(),
            Box::new(DenylistGate::allow_all()),
            Box::new(MockTranslator::always("unused")),
            config,
        );
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.retried, 1);
        assert_eq!(outcome.dead_lettered, 0);
        assert!(h.queue.dead_letters().is_empty());
        assert_eq!(h.queue.len(), 1);
    }

    #[test]
    fn empty_translation_result_fails_job() {
        let h = Harness::new();
        h.upload("b1", b"hello world");
        h.enqueue("J1", "b1", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("   ")));
        worker.poll_and_process().unwrap();

        let job = h.job("J1");
        assert_eq!(job.state, JobState::Failed);
        assert!(job.result_text.is_none());
    }

    #[test]
    fn empty_queue_returns_empty_batch() {
        let h = Harness::new();
        let worker = h.worker(Box::new(MockTranslator::always("unused")));
        let outcome = worker.poll_and_process().unwrap();
        assert_eq!(outcome.received, 0);
    }

    #[test]
    fn batch_failures_are_isolated_per_message() {
        let h = Harness::new();
        h.upload("good", b"hello world");
        h.enqueue("J-good", "good", "fr");
        h.enqueue("J-bad", "missing-blob", "fr");

        let worker = h.worker(Box::new(MockTranslator::always("bonjour le monde")));
        let outcome = worker.poll_and_process().unwrap();

        assert_eq!(outcome.acked, 1);
        assert_eq!(outcome.retried, 1);
        assert_eq!(h.job("J-good").state, JobState::Completed);
        assert_eq!(h.job("J-bad").state, JobState::Received);
    }
}
