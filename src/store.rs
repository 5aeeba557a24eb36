//! Vector store adapter over SQLite.
//!
//! Owns all persistence for documents and chunks: document CRUD, the
//! guarded lifecycle transitions, the all-or-nothing chunk insert, cosine
//! similarity search restricted to completed documents, and cascade
//! deletion. Embeddings are stored as little-endian f32 BLOBs and scored
//! in Rust (see [`crate::embedding`]).

use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{Document, DocumentStatus, EmbeddedChunk, SearchHit};

#[derive(Clone)]
pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ============ Documents ============

    /// Create a document record in `pending` state and return it.
    pub async fn create_document(
        &self,
        filename: &str,
        content_type: &str,
        byte_size: i64,
        content_hash: &str,
    ) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO documents (id, filename, content_type, byte_size, status, content_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(filename)
        .bind(content_type)
        .bind(byte_size)
        .bind(content_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(document_id = %id, filename, "created pending document");
        self.get_document(&id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(id))
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, filename, content_type, byte_size, page_count, status, error_message, chunk_count, content_hash, created_at, updated_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(document_from_row).transpose()
    }

    /// All documents, newest first.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, filename, content_type, byte_size, page_count, status, error_message, chunk_count, content_hash, created_at, updated_at FROM documents ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(document_from_row).collect()
    }

    pub async fn completed_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE status = 'completed'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn chunk_count(&self, document_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ============ Lifecycle transitions ============

    /// Claim a document for processing: `pending` → `processing`.
    ///
    /// The guarded UPDATE is the per-document lease — at most one caller
    /// wins, and the claim survives process restarts because it lives in
    /// the status column. Returns `false` when the document is missing,
    /// already claimed, or already terminal.
    pub async fn claim_for_processing(&self, id: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE documents SET status = 'processing', updated_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// `processing` → `completed`, recording page and chunk counts.
    pub async fn mark_completed(
        &self,
        id: &str,
        page_count: Option<i64>,
        chunk_count: i64,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE documents
            SET status = 'completed', page_count = ?, chunk_count = ?, error_message = NULL, updated_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(page_count)
        .bind(chunk_count)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Any non-terminal state → `failed`, recording the error message.
    pub async fn mark_failed(&self, id: &str, error_message: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE documents
            SET status = 'failed', error_message = ?, updated_at = ?
            WHERE id = ? AND status IN ('pending', 'processing')
            "#,
        )
        .bind(error_message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ============ Chunks ============

    /// Insert all chunks for a document in one transaction.
    ///
    /// Atomic with respect to the document: any failure rolls the whole
    /// batch back, leaving zero rows for the document.
    pub async fn insert_chunks(&self, document_id: &str, chunks: &[EmbeddedChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (document_id, chunk_index, content, embedding, page_number, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(chunk.piece.index)
            .bind(&chunk.piece.text)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.piece.page_number)
            .bind(&chunk.metadata_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(document_id, count = chunks.len(), "inserted chunk batch");
        Ok(())
    }

    /// Top-k most similar chunks among completed documents.
    ///
    /// Ordered by cosine similarity descending; ties broken by lower
    /// chunk id, so repeated searches over unchanged data return
    /// identical results.
    pub async fn similarity_search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, c.content, c.embedding, c.page_number, d.filename
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.status = 'completed'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(query_embedding, &blob_to_vec(&blob)) as f64;
                SearchHit {
                    chunk_id: row.get("id"),
                    document_id: row.get("document_id"),
                    document_filename: row.get("filename"),
                    text: row.get("content"),
                    page_number: row.get("page_number"),
                    score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    /// Delete a document and all its chunks in one transaction.
    ///
    /// Returns `false` when no such document exists.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

fn document_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        byte_size: row.get("byte_size"),
        page_count: row.get("page_count"),
        status: DocumentStatus::from_str(&status)?,
        error_message: row.get("error_message"),
        chunk_count: row.get("chunk_count"),
        content_hash: row.get("content_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
