//! Document parser client.
//!
//! Parsing (PDF/Office/OCR) is an external service; this module owns only
//! the contract: raw bytes + content type in, normalized text plus page
//! boundaries out. [`HttpParser`] talks to the service over JSON with the
//! document bytes base64-encoded.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ParserConfig;
use crate::error::{Error, Result};

/// Normalized output of the parser service.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedDocument {
    /// Full normalized text in reading order.
    pub text: String,
    /// Byte offset at which each page starts, ascending, first entry 0.
    /// Empty when the format has no page structure (plain text).
    #[serde(default)]
    pub page_offsets: Vec<usize>,
    #[serde(default)]
    pub page_count: Option<i64>,
}

/// External parser contract.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<ParsedDocument>;
}

/// Parser client for the HTTP parsing service.
pub struct HttpParser {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpParser {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DocumentParser for HttpParser {
    async fn parse(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<ParsedDocument> {
        let body = serde_json::json!({
            "filename": filename,
            "content_type": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        });

        let response = self
            .client
            .post(format!("{}/parse", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Parse(format!("could not reach parser service: {e}")))?;

        let status = response.status();
        if status.as_u16() == 415 {
            return Err(Error::UnsupportedFormat(format!(
                "parser does not support content type '{content_type}'"
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Parse(format!(
                "parser service error {status}: {detail}"
            )));
        }

        let parsed: ParsedDocument = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("malformed parser response: {e}")))?;

        Ok(parsed)
    }
}
