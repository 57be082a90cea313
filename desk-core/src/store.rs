//! Collaborator boundaries. Every external dependency of the routing core
//! (persistence, cache, content generation, similarity search, spreadsheet
//! export) is a trait object injected at composition; nothing reads ambient
//! globals.

use crate::models::{
    ChatSession, CustomerInfo, DashboardSummary, FieldConfig, Message, MessageId, NewFieldConfig,
    NewMessage, SessionId,
};
use anyhow::Result;
use async_trait::async_trait;
use desk_channels::Channel;
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of a transactional customer-info merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// True when at least one field gained or changed a value; the alert
    /// flag was raised in the same transaction.
    pub changed: bool,
    pub data: BTreeMap<String, String>,
}

/// Persistence collaborator. Implementations must enforce the
/// (channel, external_id) uniqueness constraint on sessions and run the
/// customer-info merge plus the alert-flag write in one transaction.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert-or-fetch keyed by identity: concurrent calls for the same
    /// (channel, external_id) must resolve to a single row.
    async fn get_or_create_session(
        &self,
        channel: Channel,
        external_id: &str,
        display_name: &str,
    ) -> Result<ChatSession>;

    async fn get_session(&self, id: SessionId) -> Result<Option<ChatSession>>;

    /// Persist the mutable columns of a session (status, receivers, alert,
    /// SLA marker, activity timestamp, display name).
    async fn update_session(&self, session: &ChatSession) -> Result<()>;

    async fn list_sessions(
        &self,
        channel: Option<Channel>,
        tag_id: Option<i64>,
    ) -> Result<Vec<ChatSession>>;

    /// Cascades to messages and customer info. Returns the number of
    /// sessions deleted.
    async fn delete_sessions(&self, ids: &[SessionId]) -> Result<u64>;

    async fn session_tags(&self, id: SessionId) -> Result<Vec<i64>>;

    async fn replace_session_tags(&self, id: SessionId, tag_ids: &[i64]) -> Result<()>;

    async fn insert_message(&self, message: NewMessage) -> Result<Message>;

    /// Last `limit` messages, oldest first.
    async fn recent_messages(&self, session_id: SessionId, limit: u32) -> Result<Vec<Message>>;

    /// Paged history, oldest first; `page` is 1-based.
    async fn history(&self, session_id: SessionId, page: u32, limit: u32) -> Result<Vec<Message>>;

    async fn delete_messages(&self, session_id: SessionId, ids: &[MessageId]) -> Result<u64>;

    async fn customer_info(&self, session_id: SessionId) -> Result<Option<CustomerInfo>>;

    /// Read-modify-write of the customer profile under one transaction:
    /// non-empty extracted values overwrite, null/empty never clobbers an
    /// existing value, and the session alert flag is raised iff anything
    /// changed.
    async fn merge_customer_info(
        &self,
        session_id: SessionId,
        extracted: &BTreeMap<String, Option<String>>,
    ) -> Result<MergeOutcome>;

    /// Field configs ordered by spreadsheet column letter.
    async fn list_field_configs(&self) -> Result<Vec<FieldConfig>>;

    async fn create_field_config(&self, config: NewFieldConfig) -> Result<FieldConfig>;

    async fn update_field_config(
        &self,
        id: i64,
        config: NewFieldConfig,
    ) -> Result<Option<FieldConfig>>;

    async fn delete_field_config(&self, id: i64) -> Result<bool>;

    async fn dashboard_summary(&self) -> Result<DashboardSummary>;
}

/// Content-generation collaborator; one call shape for both sales replies
/// and structured-field extraction (the prompt differs).
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub content: String,
    pub score: f64,
}

#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Stands in when no knowledge base is configured; replies are generated
/// from conversation context alone.
pub struct NoopSimilaritySearch;

#[async_trait]
impl SimilaritySearch for NoopSimilaritySearch {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<ScoredChunk>> {
        Ok(Vec::new())
    }
}

/// Spreadsheet export collaborator. Best-effort: implementations must
/// tolerate a header mismatch by rewriting the header row.
#[async_trait]
pub trait SheetExporter: Send + Sync {
    async fn upsert_row(&self, headers: &[String], row: &[String]) -> Result<()>;
}

/// Degraded exporter used when spreadsheet credentials are absent; keeps
/// the chat flow unaffected.
pub struct NoopSheetExporter;

#[async_trait]
impl SheetExporter for NoopSheetExporter {
    async fn upsert_row(&self, _headers: &[String], _row: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Key-value cache with per-entry TTL, used for the session view and the
/// field-config schema.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration);
    fn delete(&self, key: &str) -> bool;
}
