//! Translation client — external text-to-text service with retry/backoff.
//!
//! Transient failures (transport errors, 429, 5xx) are retried with
//! exponential backoff up to a configured cap; non-transient failures (4xx)
//! short-circuit immediately. Exhausting the budget yields a terminal error
//! distinguishable from a rejection, so the worker can label the job either
//! way.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TranslateError {
    /// Network-level or 5xx-class failure; worth retrying.
    #[error("Transient translation failure: {0}")]
    Transient(String),

    /// The API rejected the request (4xx-class); retrying cannot help.
    #[error("Translation rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The retry budget ran out on transient failures.
    #[error("Translation failed after {retries} retries: {last}")]
    RetriesExhausted { retries: u32, last: String },

    #[error("Unparseable translation response: {0}")]
    ResponseParsing(String),
}

impl TranslateError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Longest backoff the policy will ever sleep, however large the
/// configured multiplier or retry count.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff policy: `base_delay * multiplier^(retry-1)` between
/// transient failures, up to `max_retries` retries after the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Backoff before the given retry (1-based), saturating at
    /// [`MAX_BACKOFF`].
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }

    /// Run `op` with this policy. `op` receives the attempt number
    /// (1 = first attempt, then one per retry). Transient errors are
    /// retried; anything else propagates unchanged.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, TranslateError>,
    ) -> Result<T, TranslateError> {
        let mut last: Option<TranslateError> = None;

        for attempt in 1..=(self.max_retries + 1) {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt, error = %e, "Transient translation failure");
                    last = Some(e);
                    let retry = attempt; // retry N follows attempt N
                    if retry <= self.max_retries {
                        std::thread::sleep(self.delay_for(retry));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(TranslateError::RetriesExhausted {
            retries: self.max_retries,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

/// Opaque text-to-text translation service.
pub trait TranslationClient: Send + Sync {
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError>;
}

/// Request body for the translation API.
#[derive(Serialize)]
struct TranslationRequest<'a> {
    inputs: &'a str,
    parameters: TranslationParameters<'a>,
}

#[derive(Serialize)]
struct TranslationParameters<'a> {
    source_language: &'a str,
    target_language: &'a str,
}

/// JSON response shape: `[{"translation_text": "..."}]`.
#[derive(Deserialize)]
struct TranslationChunk {
    translation_text: String,
}

/// HTTP client for a hosted translation model endpoint.
pub struct HttpTranslationClient {
    endpoint: String,
    client: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl HttpTranslationClient {
    pub fn new(endpoint: &str, timeout: Duration, retry: RetryPolicy) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            retry,
        }
    }

    fn send_once(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError> {
        let body = TranslationRequest {
            inputs: text,
            parameters: TranslationParameters {
                source_language: source_lang,
                target_language: target_lang,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| TranslateError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            let body = response.text().unwrap_or_default();
            return Err(TranslateError::Transient(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranslateError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .text()
            .map_err(|e| TranslateError::Transient(e.to_string()))?;
        parse_translation_body(&raw)
    }
}

impl TranslationClient for HttpTranslationClient {
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError> {
        self.retry
            .run(|_attempt| self.send_once(text, source_lang, target_lang))
    }
}

/// Accept either the model-server JSON shape or a plain-text body.
fn parse_translation_body(raw: &str) -> Result<String, TranslateError> {
    if let Ok(chunks) = serde_json::from_str::<Vec<TranslationChunk>>(raw) {
        return match chunks.into_iter().next() {
            Some(chunk) => Ok(chunk.translation_text),
            None => Err(TranslateError::ResponseParsing(
                "empty translation array".to_string(),
            )),
        };
    }

    let text = raw.trim();
    if text.is_empty() {
        return Err(TranslateError::ResponseParsing("empty response body".to_string()));
    }
    Ok(text.to_string())
}
