//! Embedding gateway and provider abstraction.
//!
//! The [`Embedder`] trait is the seam to the external embedding function;
//! [`HttpEmbedder`] implements it against an OpenAI-compatible endpoint.
//! [`EmbeddingGateway`] wraps any embedder with the pipeline's contract:
//! order-preserving batching, bounded exponential-backoff retry for
//! transient failures, and strict dimensionality validation before
//! anything reaches the store.
//!
//! Also provides the vector utilities shared with the store:
//! [`cosine_similarity`], [`vec_to_blob`], [`blob_to_vec`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// External embedding function: ordered texts in, ordered vectors out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Wraps an [`Embedder`] with batching, retry, and dimension validation.
#[derive(Clone)]
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
}

impl EmbeddingGateway {
    pub fn new(embedder: Arc<dyn Embedder>, config: &EmbeddingConfig) -> Self {
        Self {
            embedder,
            dims: config.dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Embed all texts, in order, batching up to the configured size.
    ///
    /// Transient failures are retried per batch with exponential backoff
    /// (1s, 2s, 4s, ... capped at 32s) up to `max_retries`; exhaustion
    /// fails with [`Error::EmbeddingUnavailable`]. A vector of the wrong
    /// dimensionality fails the whole call with
    /// [`Error::EmbeddingDimension`] — malformed vectors are never
    /// handed to the caller.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_batch_with_retry(batch).await?;

            if vectors.len() != batch.len() {
                return Err(Error::EmbeddingUnavailable(format!(
                    "embedding service returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }
            for v in &vectors {
                if v.len() != self.dims {
                    return Err(Error::EmbeddingDimension {
                        expected: self.dims,
                        actual: v.len(),
                    });
                }
            }
            out.extend(vectors);
        }

        Ok(out)
    }

    /// Embed a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::EmbeddingUnavailable("empty embedding response".into()))
    }

    async fn embed_batch_with_retry(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying embedding batch");
                tokio::time::sleep(delay).await;
            }

            match self.embedder.embed(batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "transient embedding failure");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let detail = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".into());
        Err(Error::EmbeddingUnavailable(format!(
            "giving up after {} retries: {detail}",
            self.max_retries
        )))
    }
}

// ============ HTTP embedder ============

/// Embedder speaking the OpenAI embeddings wire shape
/// (`POST {endpoint}/embeddings` with `{"model": ..., "input": [...]}`).
///
/// A bearer token is sent when `OPENAI_API_KEY` is set; local servers
/// work without one.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.endpoint))
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let json: serde_json::Value = response.json().await?;
            return parse_embeddings_response(&json);
        }

        let detail = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            // Rate limited or server trouble — worth retrying.
            Err(Error::EmbeddingUnavailable(format!(
                "embedding service error {status}: {detail}"
            )))
        } else {
            // Remaining 4xx mean a bad model name, key, or payload.
            Err(Error::Configuration(format!(
                "embedding service rejected request ({status}): {detail}"
            )))
        }
    }
}

/// Extract `data[].embedding` arrays in order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::EmbeddingUnavailable("malformed response: missing data".into()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let values = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::EmbeddingUnavailable("malformed response: missing embedding".into())
            })?;
        embeddings.push(
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }

    Ok(embeddings)
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors, in `[-1.0, 1.0]`.
/// Returns `0.0` for empty or mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scriptable embedder: fails the first `failures` calls with a
    /// transient error, then returns `dims`-length vectors.
    struct ScriptedEmbedder {
        dims: usize,
        failures: AtomicUsize,
        calls: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedEmbedder {
        fn new(dims: usize, failures: usize) -> Self {
            Self {
                dims,
                failures: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
                batch_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(texts.len());

            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::EmbeddingUnavailable("simulated outage".into()));
            }

            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![i as f32; self.dims])
                .collect())
        }
    }

    fn config(dims: usize, batch_size: usize, max_retries: u32) -> EmbeddingConfig {
        EmbeddingConfig {
            dims,
            batch_size,
            max_retries,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn batches_and_preserves_order() {
        let embedder = Arc::new(ScriptedEmbedder::new(4, 0));
        let gateway = EmbeddingGateway::new(embedder.clone(), &config(4, 3, 0));

        let texts: Vec<String> = (0..8).map(|i| format!("text {i}")).collect();
        let vectors = gateway.embed_texts(&texts).await.unwrap();

        assert_eq!(vectors.len(), 8);
        assert_eq!(
            *embedder.batch_sizes.lock().unwrap(),
            vec![3, 3, 2],
            "inputs should be split into batches of at most batch_size"
        );
        // Index-aligned within each batch.
        assert_eq!(vectors[0], vec![0.0; 4]);
        assert_eq!(vectors[4], vec![1.0; 4]);
    }

    #[tokio::test]
    async fn rejects_wrong_dimensionality() {
        let embedder = Arc::new(ScriptedEmbedder::new(4, 0));
        // Gateway expects 768-dim vectors; the embedder produces 4.
        let gateway = EmbeddingGateway::new(embedder, &config(768, 32, 0));

        let err = gateway
            .embed_texts(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::EmbeddingDimension {
                expected: 768,
                actual: 4
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_then_succeeds() {
        let embedder = Arc::new(ScriptedEmbedder::new(4, 2));
        let gateway = EmbeddingGateway::new(embedder.clone(), &config(4, 32, 3));

        let vectors = gateway.embed_texts(&["a".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fail_with_unavailable() {
        let embedder = Arc::new(ScriptedEmbedder::new(4, 100));
        let gateway = EmbeddingGateway::new(embedder.clone(), &config(4, 32, 2));

        let err = gateway.embed_texts(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
        // Initial attempt plus two retries.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        struct Rejecting;

        #[async_trait]
        impl Embedder for Rejecting {
            fn model_name(&self) -> &str {
                "rejecting"
            }
            async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(Error::Configuration("bad model name".into()))
            }
        }

        let gateway = EmbeddingGateway::new(Arc::new(Rejecting), &config(4, 32, 5));
        let err = gateway.embed_texts(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn blob_round_trip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn cosine_ranges() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);

        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);

        let c = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &c) + 1.0).abs() < 1e-6);

        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn parses_openai_shape() {
        let json = serde_json::json!({
            "data": [
                {"embedding": [0.1, 0.2]},
                {"embedding": [0.3, 0.4]},
            ]
        });
        let vectors = parse_embeddings_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);

        let bad = serde_json::json!({"error": "nope"});
        assert!(parse_embeddings_response(&bad).is_err());
    }
}
