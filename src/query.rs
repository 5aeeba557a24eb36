//! Retrieval-augmented query engine.
//!
//! Embeds the question, retrieves the most similar chunks from completed
//! documents, assembles a grounded prompt, and asks the language model
//! under a timeout budget. Failing to find *any* completed document is a
//! hard error before any external call; finding completed documents but
//! no usable passages is a soft outcome — the model is still asked, and
//! the answer is flagged as ungrounded.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::QueryConfig;
use crate::embedding::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::llm::LanguageModel;
use crate::models::{QueryAnswer, SearchHit};
use crate::store::VectorStore;

const PROMPT_TEMPLATE: &str = "You are a helpful assistant that answers questions based on the provided context.\n\
Use the following pieces of context to answer the question at the end.\n\
If you don't know the answer based on the context, just say that you don't know.\n\
Don't try to make up an answer. Be concise and accurate.\n\n\
Context:\n{context}\n\n\
Question: {question}\n\n\
Answer:";

const EMPTY_CONTEXT: &str = "(no relevant passages were found in the document collection)";

pub struct QueryEngine {
    store: VectorStore,
    gateway: EmbeddingGateway,
    model: Arc<dyn LanguageModel>,
    min_score: f64,
    timeout_secs: u64,
}

impl QueryEngine {
    pub fn new(
        store: VectorStore,
        gateway: EmbeddingGateway,
        model: Arc<dyn LanguageModel>,
        query_config: &QueryConfig,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            gateway,
            model,
            min_score: query_config.min_score,
            timeout_secs,
        }
    }

    /// Retrieval only: embed the question and return the top-k hits.
    pub async fn search(&self, question: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.store.completed_count().await? == 0 {
            return Err(Error::NoDocumentsAvailable);
        }
        let query_embedding = self.gateway.embed_query(question).await?;
        self.store.similarity_search(&query_embedding, top_k).await
    }

    /// Full RAG query: retrieve, prompt, generate, cite.
    pub async fn answer(&self, question: &str, top_k: usize) -> Result<QueryAnswer> {
        // Hard failure before any external call: nothing to retrieve from.
        if self.store.completed_count().await? == 0 {
            return Err(Error::NoDocumentsAvailable);
        }

        let query_embedding = self.gateway.embed_query(question).await?;
        let mut hits = self.store.similarity_search(&query_embedding, top_k).await?;

        // Weak matches would only mislead the model; drop them and let the
        // grounded flag tell the caller what happened.
        hits.retain(|h| h.score >= self.min_score);
        let grounded = !hits.is_empty();
        debug!(hits = hits.len(), grounded, "retrieval finished");

        let prompt = build_prompt(question, &hits);

        let generation = self.model.generate(&prompt);
        let answer = match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            generation,
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::QueryTimeout {
                    seconds: self.timeout_secs,
                })
            }
        };

        info!(
            model = self.model.model_name(),
            sources = hits.len(),
            grounded,
            "query answered"
        );

        Ok(QueryAnswer {
            question: question.to_string(),
            answer,
            sources: hits,
            model: self.model.model_name().to_string(),
            grounded,
        })
    }
}

/// Assemble the grounded prompt: numbered source blocks, then the
/// question. With no hits the context is an explicit empty-context
/// marker rather than a silent blank.
fn build_prompt(question: &str, hits: &[SearchHit]) -> String {
    let context = if hits.is_empty() {
        EMPTY_CONTEXT.to_string()
    } else {
        hits.iter()
            .enumerate()
            .map(|(i, hit)| {
                let mut header = format!("[Source {}: {}", i + 1, hit.document_filename);
                if let Some(page) = hit.page_number {
                    header.push_str(&format!(", Page {page}"));
                }
                header.push(']');
                format!("{header}\n{}", hit.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    PROMPT_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question)
}
