//! Core data models used throughout docdex.
//!
//! These types represent the documents, chunks, and query results that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;

use crate::error::Error;

/// Lifecycle status of a document's processing journey.
///
/// `Pending` and `Processing` are non-terminal; `Completed` and `Failed`
/// are terminal for a given document instance. Transitions happen only
/// through the store's transition methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(Error::Configuration(format!(
                "unknown document status: {other}"
            ))),
        }
    }
}

/// Document metadata row. Owned by the lifecycle manager; the body text is
/// never stored — only its chunks are.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub byte_size: i64,
    pub page_count: Option<i64>,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub chunk_count: i64,
    /// SHA-256 of the raw uploaded bytes.
    pub content_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A span of document text produced by the chunker, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPiece {
    /// Zero-based, contiguous within the document.
    pub index: i64,
    pub text: String,
    /// Byte offset of the span's start in the normalized text.
    pub offset: usize,
    /// 1-based page containing the span's start.
    pub page_number: Option<i64>,
}

/// A chunk paired with its embedding vector, ready for storage.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub piece: ChunkPiece,
    pub embedding: Vec<f32>,
    pub metadata_json: Option<String>,
}

/// A retrieved chunk annotated for citation.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub document_id: String,
    pub document_filename: String,
    pub text: String,
    pub page_number: Option<i64>,
    /// Cosine similarity against the query embedding.
    pub score: f64,
}

/// The ephemeral result of a RAG query. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub question: String,
    pub answer: String,
    /// Sources actually used as prompt context, in retrieval order.
    pub sources: Vec<SearchHit>,
    pub model: String,
    /// False when the prompt carried no retrieved context, meaning the
    /// answer may be unsupported by the corpus.
    pub grounded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            DocumentStatus::Pending,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::from_str(s.as_str()).unwrap(), s);
        }
        assert!(DocumentStatus::from_str("archived").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!DocumentStatus::Pending.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
        assert!(DocumentStatus::Completed.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
    }
}
