//! Shared fixtures: a scratch database plus fake parser, embedder, and
//! language model collaborators with call accounting.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use docdex::config::{ChunkingConfig, DbConfig, EmbeddingConfig};
use docdex::embedding::{Embedder, EmbeddingGateway};
use docdex::error::{Error, Result};
use docdex::lifecycle::LifecycleManager;
use docdex::llm::LanguageModel;
use docdex::parser::{DocumentParser, ParsedDocument};
use docdex::store::VectorStore;

pub const TEST_DIMS: usize = 3;

/// Fresh SQLite database in a temp directory. Keep the `TempDir` alive
/// for the duration of the test.
pub async fn test_store() -> (TempDir, VectorStore) {
    let dir = TempDir::new().unwrap();
    let config = DbConfig {
        path: dir.path().join("docdex.db"),
    };
    let pool = docdex::db::connect(&config).await.unwrap();
    docdex::migrate::run_migrations(&pool).await.unwrap();
    (dir, VectorStore::new(pool))
}

/// Deterministic 3-dim embedding: axis 0 fires on the word "x", axis 1 on
/// the word "beta", axis 2 is a constant bias. All components are
/// non-negative, so cosine scores land in [0, 1].
pub fn test_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let has_word = |word: &str| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == word)
    };
    vec![
        if has_word("x") { 1.0 } else { 0.0 },
        if has_word("beta") { 1.0 } else { 0.0 },
        1.0,
    ]
}

// ============ Fake parser ============

pub enum ParseScript {
    /// Return this text with these page offsets.
    Text {
        text: String,
        page_offsets: Vec<usize>,
        page_count: Option<i64>,
    },
    Fail(String),
    Unsupported(String),
}

pub struct FakeParser {
    pub script: ParseScript,
    pub calls: AtomicUsize,
}

impl FakeParser {
    pub fn text(text: &str) -> Self {
        Self {
            script: ParseScript::Text {
                text: text.to_string(),
                page_offsets: vec![0],
                page_count: Some(1),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn paged(text: &str, page_offsets: Vec<usize>, page_count: i64) -> Self {
        Self {
            script: ParseScript::Text {
                text: text.to_string(),
                page_offsets,
                page_count: Some(page_count),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            script: ParseScript::Fail(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentParser for FakeParser {
    async fn parse(
        &self,
        _bytes: &[u8],
        _filename: &str,
        _content_type: &str,
    ) -> Result<ParsedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            ParseScript::Text {
                text,
                page_offsets,
                page_count,
            } => Ok(ParsedDocument {
                text: text.clone(),
                page_offsets: page_offsets.clone(),
                page_count: *page_count,
            }),
            ParseScript::Fail(msg) => Err(Error::Parse(msg.clone())),
            ParseScript::Unsupported(msg) => Err(Error::UnsupportedFormat(msg.clone())),
        }
    }
}

// ============ Fake embedder ============

pub struct FakeEmbedder {
    /// Remaining calls that fail with a transient error before recovery.
    pub failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(usize::MAX),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedder"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.failures.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(Error::EmbeddingUnavailable("simulated timeout".into()));
        }
        Ok(texts.iter().map(|t| test_vector(t)).collect())
    }
}

pub fn test_gateway(embedder: Arc<FakeEmbedder>) -> EmbeddingGateway {
    let config = EmbeddingConfig {
        dims: TEST_DIMS,
        batch_size: 8,
        max_retries: 1,
        ..EmbeddingConfig::default()
    };
    EmbeddingGateway::new(embedder, &config)
}

// ============ Fake language model ============

pub enum LlmScript {
    Answer(String),
    Fail(String),
    Hang(Duration),
}

pub struct FakeLlm {
    pub script: LlmScript,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            script: LlmScript::Answer(answer.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn hanging(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: LlmScript::Hang(duration),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            script: LlmScript::Fail(message.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    fn model_name(&self) -> &str {
        "fake:model"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.script {
            LlmScript::Answer(answer) => Ok(answer.clone()),
            LlmScript::Fail(msg) => Err(Error::Generation(msg.clone())),
            LlmScript::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok("too late".to_string())
            }
        }
    }
}

// ============ Assembly ============

pub fn manager_with(
    store: &VectorStore,
    parser: Arc<FakeParser>,
    embedder: Arc<FakeEmbedder>,
    chunking: ChunkingConfig,
) -> LifecycleManager {
    LifecycleManager::new(store.clone(), parser, test_gateway(embedder), chunking)
}
