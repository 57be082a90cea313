//! Background customer-info enrichment.
//!
//! After each customer message a pass is scheduled: read recent history,
//! ask the content-generation collaborator for structured fields, merge
//! into the profile, raise the alert flag on genuine change, then
//! best-effort export and broadcast. At most one pass runs per session at
//! a time; a pass reads history fresh at execution, so a request arriving
//! while one is in flight is coalesced rather than queued.

use crate::error::{Result, RoutingError};
use crate::fields::{FieldConfigService, build_export_row};
use crate::models::{FieldConfig, Message, SessionId, WsEvent};
use crate::registry::ConnectionRegistry;
use crate::responder::strip_code_fences;
use crate::sessions::SessionStore;
use crate::store::{ContentGenerator, SheetExporter, Store};
use dashmap::DashSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// How many trailing messages feed the extraction prompt.
    pub history_limit: u32,
    /// Bound on each external call (LLM, spreadsheet); hitting it is a
    /// non-fatal enrichment failure.
    pub timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            history_limit: 15,
            timeout: Duration::from_secs(20),
        }
    }
}

pub struct EnrichmentCoordinator {
    store: Arc<dyn Store>,
    sessions: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
    fields: Arc<FieldConfigService>,
    generator: Arc<dyn ContentGenerator>,
    exporter: Arc<dyn SheetExporter>,
    in_flight: DashSet<SessionId>,
    config: EnrichmentConfig,
}

impl EnrichmentCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<SessionStore>,
        registry: Arc<ConnectionRegistry>,
        fields: Arc<FieldConfigService>,
        generator: Arc<dyn ContentGenerator>,
        exporter: Arc<dyn SheetExporter>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            registry,
            fields,
            generator,
            exporter,
            in_flight: DashSet::new(),
            config,
        }
    }

    /// Fire-and-forget a pass for this session. Sessions are independent, so
    /// the in-flight marker is per session id, not a global lock.
    pub fn schedule(self: &Arc<Self>, session_id: SessionId) {
        if !self.in_flight.insert(session_id) {
            tracing::debug!(session_id, "enrichment already in flight; coalescing");
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.run_once(session_id).await {
                tracing::warn!(%e, session_id, "enrichment pass failed");
            }
            this.in_flight.remove(&session_id);
        });
    }

    async fn run_once(&self, session_id: SessionId) -> Result<()> {
        let configs = self
            .fields
            .all()
            .await
            .map_err(RoutingError::enrichment)?;
        if configs.is_empty() {
            return Ok(());
        }

        let messages = self
            .store
            .recent_messages(session_id, self.config.history_limit)
            .await
            .map_err(RoutingError::enrichment)?;
        if messages.is_empty() {
            return Ok(());
        }

        let prompt = extraction_prompt(&render_history(&messages), &configs);
        let raw = tokio::time::timeout(self.config.timeout, self.generator.generate(&prompt))
            .await
            .map_err(|_| RoutingError::Enrichment("field extraction timed out".to_string()))?
            .map_err(RoutingError::enrichment)?;
        let extracted = parse_extracted_fields(&raw)?;
        if !extracted.values().any(Option::is_some) {
            return Ok(());
        }

        let outcome = self
            .store
            .merge_customer_info(session_id, &extracted)
            .await
            .map_err(RoutingError::enrichment)?;
        if !outcome.changed {
            return Ok(());
        }
        tracing::info!(session_id, fields = outcome.data.len(), "customer info updated");

        // The alert flag changed inside the merge transaction; drop the
        // cached view so the next dashboard read sees it.
        self.sessions.invalidate(session_id);

        if let Some((headers, row)) = build_export_row(&configs, &outcome.data) {
            let export =
                tokio::time::timeout(self.config.timeout, self.exporter.upsert_row(&headers, &row))
                    .await;
            match export {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(%e, session_id, "spreadsheet export failed"),
                Err(_) => tracing::warn!(session_id, "spreadsheet export timed out"),
            }
        }

        self.registry.broadcast_to_admins(&WsEvent::CustomerInfoUpdate {
            session_id,
            customer_data: outcome.data,
        });
        Ok(())
    }
}

/// Merge an extraction result into the existing profile. Non-empty new
/// values overwrite; null/empty extraction output never clobbers a value
/// already present, which also makes late-arriving passes safe.
pub fn merge_fields(
    existing: &BTreeMap<String, String>,
    extracted: &BTreeMap<String, Option<String>>,
) -> (BTreeMap<String, String>, bool) {
    let mut merged = existing.clone();
    let mut changed = false;
    for (key, value) in extracted {
        let Some(value) = value else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if existing.get(key).map(String::as_str) != Some(value) {
            merged.insert(key.clone(), value.to_string());
            changed = true;
        }
    }
    (merged, changed)
}

pub(crate) fn render_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender_type.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn extraction_prompt(history: &str, configs: &[FieldConfig]) -> String {
    let field_lines = configs
        .iter()
        .map(|c| format!("- {}", c.column_name))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Bạn là công cụ phân tích hội thoại để trích xuất thông tin khách hàng.\n\
         \n\
         Đoạn hội thoại gần đây:\n{history}\n\
         \n\
         Hãy trích xuất thông tin khách hàng và trả về JSON với đúng các trường sau:\n{field_lines}\n\
         \n\
         Quy tắc: chỉ dùng các trường trên, trường nào không có thông tin thì để null, \
         chỉ trả về JSON thuần túy, không markdown."
    )
}

/// Parse the extraction output: a JSON object mapping field name to value or
/// explicit absence. Tolerates code fences and scalar non-string values.
fn parse_extracted_fields(raw: &str) -> Result<BTreeMap<String, Option<String>>> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value = serde_json::from_str(cleaned)
        .map_err(|e| RoutingError::Enrichment(format!("extraction output is not JSON: {e}")))?;
    let serde_json::Value::Object(object) = value else {
        return Err(RoutingError::Enrichment(
            "extraction output is not a JSON object".to_string(),
        ));
    };

    let mut fields = BTreeMap::new();
    for (key, value) in object {
        let parsed = match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => {
                let s = s.trim().to_string();
                if s.is_empty() || s == "null" || s == "None" {
                    None
                } else {
                    Some(s)
                }
            }
            other => Some(other.to_string()),
        };
        fields.insert(key, parsed);
    }
    Ok(fields)
}
