use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "doctran";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter for hosting processes that don't set RUST_LOG.
pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info")
}

/// Pipeline worker configuration.
///
/// Defaults mirror the production deployment: batches of 10 messages,
/// 20-second long poll, 5 deliveries before a message is dead-lettered.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum messages pulled per poll.
    pub batch_size: usize,
    /// Long-poll wait before returning an empty batch.
    pub poll_wait_secs: u64,
    /// Deliveries allowed before a message is moved to the dead-letter path.
    pub max_receives: u32,
    /// Source language assumed when the ingress message omits one.
    pub default_source_language: String,
    /// Number of worker threads in the pool.
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_wait_secs: 20,
            max_receives: 5,
            default_source_language: "en".to_string(),
            worker_count: 2,
        }
    }
}

impl PipelineConfig {
    pub fn poll_wait(&self) -> Duration {
        Duration::from_secs(self.poll_wait_secs)
    }
}
