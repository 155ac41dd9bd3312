//! Text extraction — decrypted document bytes to plain text.
//!
//! Extraction backends are registered per format, mirroring how moderation
//! and translation are pluggable. The crate ships a UTF-8 plain-text
//! backend; PDF and DOCX backends plug in via [`TextExtractor`] without
//! changing the worker. A document no registered backend can handle is an
//! extraction failure, which the pipeline treats as non-retryable.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(DocumentFormat),

    #[error("Document is not valid {0} content")]
    InvalidContent(DocumentFormat),

    #[error("Document contains no extractable text")]
    EmptyDocument,
}

/// Document container format, sniffed from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
    Unknown,
}

impl DocumentFormat {
    /// Classify decrypted bytes. DOCX is a ZIP container, so any ZIP local
    /// file header classifies as DOCX here; the backend rejects non-DOCX
    /// archives during extraction.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else if bytes.starts_with(b"PK\x03\x04") {
            Self::Docx
        } else if std::str::from_utf8(bytes).is_ok() {
            Self::PlainText
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format-specific extraction backend.
pub trait TextExtractor: Send + Sync {
    /// Whether this backend handles the given format.
    fn supports(&self, format: DocumentFormat) -> bool;

    /// Extract plain text from decrypted document bytes.
    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// UTF-8 plain-text backend.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, format: DocumentFormat) -> bool {
        format == DocumentFormat::PlainText
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ExtractError::InvalidContent(DocumentFormat::PlainText))?
            .trim();

        if text.is_empty() {
            return Err(ExtractError::EmptyDocument);
        }
        Ok(text.to_string())
    }
}

/// Sniff the format and dispatch to the first backend that supports it.
pub fn extract_text(
    extractors: &[Box<dyn TextExtractor>],
    bytes: &[u8],
) -> Result<String, ExtractError> {
    let format = DocumentFormat::sniff(bytes);
    let backend = extractors
        .iter()
        .find(|e| e.supports(format))
        .ok_or(ExtractError::UnsupportedFormat(format))?;
    backend.extract(bytes)
}
