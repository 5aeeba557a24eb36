//! Document lifecycle manager.
//!
//! Owns the processing state machine:
//!
//! ```text
//! pending --(begin processing)--> processing --(all chunks stored)--> completed
//! pending --(begin processing)--> processing --(any step fails)-----> failed
//! ```
//!
//! [`LifecycleManager::submit`] accepts raw bytes, records a `pending`
//! document, and hands the long-running parse/chunk/embed/store work to a
//! spawned task — the caller gets the document id immediately and observes
//! progress by polling status. No error escapes the processing entry
//! point: every failure becomes a `failed` status with a human-readable
//! message.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chunk::split_text;
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::models::{Document, EmbeddedChunk};
use crate::parser::DocumentParser;
use crate::store::VectorStore;

#[derive(Clone)]
pub struct LifecycleManager {
    store: VectorStore,
    parser: Arc<dyn DocumentParser>,
    gateway: EmbeddingGateway,
    chunking: ChunkingConfig,
}

impl LifecycleManager {
    pub fn new(
        store: VectorStore,
        parser: Arc<dyn DocumentParser>,
        gateway: EmbeddingGateway,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            parser,
            gateway,
            chunking,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Accept a document: record it as `pending` and start processing in
    /// the background. Returns immediately with the new document.
    pub async fn submit(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<Document> {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = format!("{:x}", hasher.finalize());

        let document = self
            .store
            .create_document(filename, content_type, bytes.len() as i64, &content_hash)
            .await?;

        let this = self.clone();
        let id = document.id.clone();
        let filename = filename.to_string();
        let content_type = content_type.to_string();
        tokio::spawn(async move {
            this.process(&id, &bytes, &filename, &content_type).await;
        });

        Ok(document)
    }

    /// Run one processing attempt for a document.
    ///
    /// Claims the document first; a duplicate call for an id that is
    /// already processing (or terminal) is rejected without touching
    /// anything. All pipeline errors are contained here and recorded as
    /// document state.
    pub async fn process(&self, document_id: &str, bytes: &[u8], filename: &str, content_type: &str) {
        match self.store.claim_for_processing(document_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(document_id, "document not claimable; skipping duplicate processing run");
                return;
            }
            Err(e) => {
                error!(document_id, error = %e, "failed to claim document");
                return;
            }
        }

        match self.run_pipeline(document_id, bytes, filename, content_type).await {
            Ok(chunk_count) => {
                info!(document_id, chunk_count, "document processed");
            }
            Err(e) => {
                warn!(document_id, error = %e, "document processing failed");
                if let Err(store_err) = self.store.mark_failed(document_id, &e.to_string()).await {
                    error!(document_id, error = %store_err, "failed to record failure status");
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        document_id: &str,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<i64> {
        let parsed = self.parser.parse(bytes, filename, content_type).await?;

        let pieces = split_text(&parsed.text, &parsed.page_offsets, &self.chunking)?;
        if pieces.is_empty() {
            return Err(Error::Parse("no text content extracted from document".into()));
        }

        let texts: Vec<String> = pieces.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.gateway.embed_texts(&texts).await?;

        let chunks: Vec<EmbeddedChunk> = pieces
            .into_iter()
            .zip(embeddings)
            .map(|(piece, embedding)| {
                let metadata_json =
                    Some(serde_json::json!({ "offset": piece.offset }).to_string());
                EmbeddedChunk {
                    piece,
                    embedding,
                    metadata_json,
                }
            })
            .collect();

        self.store.insert_chunks(document_id, &chunks).await?;

        let page_count = parsed.page_count.or_else(|| {
            chunks.iter().filter_map(|c| c.piece.page_number).max()
        });
        let chunk_count = chunks.len() as i64;
        self.store
            .mark_completed(document_id, page_count, chunk_count)
            .await?;

        Ok(chunk_count)
    }

    /// Side-effect-free status read.
    pub async fn status(&self, document_id: &str) -> Result<Document> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Document>> {
        self.store.list_documents().await
    }

    /// Explicit deletion request: cascades to the document's chunks.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        if !self.store.delete_document(document_id).await? {
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }
        info!(document_id, "document deleted");
        Ok(())
    }
}
