//! Error taxonomy for the ingestion and query pipelines.
//!
//! Ingestion-time errors never escape the lifecycle manager — they are
//! recorded on the document as a `failed` status plus a human-readable
//! message. Query-time errors do surface, because the caller is waiting
//! synchronously for an answer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (bad chunk/overlap parameters, unknown
    /// provider, missing credentials). Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The parser service does not support this content type.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The parser service failed to extract text.
    #[error("parse error: {0}")]
    Parse(String),

    /// An embedding vector came back with the wrong dimensionality.
    /// The whole batch is rejected; nothing malformed reaches the store.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimension { expected: usize, actual: usize },

    /// The embedding service is unreachable or rate-limited and retries
    /// are exhausted.
    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// No document has finished processing, so there is nothing to
    /// retrieve against. User-actionable: upload and wait.
    #[error("no completed documents available to answer from")]
    NoDocumentsAvailable,

    /// The language model did not answer within the timeout budget.
    /// Retryable by the caller.
    #[error("language model did not respond within {seconds}s")]
    QueryTimeout { seconds: u64 },

    /// The language model rejected the request or returned garbage.
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::EmbeddingUnavailable(_) | Error::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::EmbeddingUnavailable("rate limited".into()).is_transient());
        assert!(!Error::Configuration("overlap too large".into()).is_transient());
        assert!(!Error::EmbeddingDimension {
            expected: 768,
            actual: 384
        }
        .is_transient());
        assert!(!Error::NoDocumentsAvailable.is_transient());
    }

    #[test]
    fn messages_are_human_readable() {
        let e = Error::EmbeddingDimension {
            expected: 768,
            actual: 12,
        };
        assert_eq!(
            e.to_string(),
            "embedding dimension mismatch: expected 768, got 12"
        );
        let e = Error::QueryTimeout { seconds: 120 };
        assert!(e.to_string().contains("120s"));
    }
}
