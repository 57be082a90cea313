//! HTTP implementations of the external collaborators, plus the adapter
//! that plugs the Gemini client into the core's generation boundary.

use anyhow::Result;
use async_trait::async_trait;
use desk_core::{ContentGenerator, ScoredChunk, SheetExporter, SimilaritySearch};
use desk_llm::GeminiClient;
use serde::Deserialize;
use std::time::Duration;

/// Placeholder generator for deployments without an LLM key: every call
/// fails, which the callers already treat as a skipped cycle.
pub struct DisabledGenerator;

#[async_trait]
impl ContentGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(anyhow::anyhow!("content generation is not configured"))
    }
}

pub struct GeminiGenerator {
    client: GeminiClient,
}

impl GeminiGenerator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(self.client.generate(prompt).await?)
    }
}

/// Pushes profile rows to a spreadsheet bridge endpoint (an Apps
/// Script-style web app). The bridge owns header reconciliation; a header
/// mismatch on its side rewrites the header row rather than failing.
pub struct HttpSheetExporter {
    http: reqwest::Client,
    url: String,
}

impl HttpSheetExporter {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SheetExporter for HttpSheetExporter {
    async fn upsert_row(&self, headers: &[String], row: &[String]) -> Result<()> {
        let body = serde_json::json!({ "headers": headers, "row": row });
        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "sheet export failed: status={status} body={body}"
            ));
        }
        Ok(())
    }
}

/// Queries an external similarity-search service for knowledge chunks.
pub struct HttpSimilaritySearch {
    http: reqwest::Client,
    url: String,
}

impl HttpSimilaritySearch {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    content: String,
    #[serde(default)]
    score: f64,
}

#[async_trait]
impl SimilaritySearch for HttpSimilaritySearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let body = serde_json::json!({ "query": query, "k": k });
        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "similarity search failed: status={status} body={body}"
            ));
        }
        let hits: Vec<SearchHit> = response.json().await?;
        Ok(hits
            .into_iter()
            .map(|hit| ScoredChunk {
                content: hit.content,
                score: hit.score,
            })
            .collect())
    }
}
