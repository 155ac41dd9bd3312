pub mod blob;
pub mod config;
pub mod crypto;
pub mod db;
pub mod extract;
pub mod job;
pub mod moderation;
pub mod queue;
pub mod translate;
pub mod worker;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for a hosting process.
///
/// Respects `RUST_LOG` when set, otherwise falls back to the crate default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
