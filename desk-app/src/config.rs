//! deskflow configuration loader.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeskflowConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub enrichment: EnrichmentSection,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_database_path() -> String {
    "deskflow.db".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Answer customer messages on unclaimed sessions automatically.
    #[serde(default = "default_auto_reply")]
    pub auto_reply: bool,
}

fn default_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_auto_reply() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: default_model(),
            auto_reply: default_auto_reply(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentSection {
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_history_limit() -> u32 {
    15
}

fn default_timeout_seconds() -> u64 {
    20
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Spreadsheet bridge endpoint; absent means export degrades to a no-op.
    #[serde(default)]
    pub sheet_export_url: Option<String>,
    /// Similarity-search service endpoint; absent means replies are
    /// generated without knowledge-base context.
    #[serde(default)]
    pub search_url: Option<String>,
}

impl DeskflowConfig {
    /// Load from the given path (or the default location). A missing file is
    /// not an error: defaults plus env overrides make a runnable local setup.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(default_config_path);
        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => toml::from_str(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(config_path = %path.display(), "no config file; using defaults");
                DeskflowConfig::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DESKFLOW_BIND_ADDR") {
            if !v.trim().is_empty() {
                self.general.bind_addr = v;
            }
        }
        if let Ok(v) = std::env::var("DESKFLOW_DATABASE") {
            if !v.trim().is_empty() {
                self.general.database_path = v;
            }
        }
        if let Ok(v) = std::env::var("GEMINI_API_KEY") {
            if !v.trim().is_empty() {
                self.llm.gemini_api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DESKFLOW_SHEET_EXPORT_URL") {
            if !v.trim().is_empty() {
                self.integrations.sheet_export_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DESKFLOW_SEARCH_URL") {
            if !v.trim().is_empty() {
                self.integrations.search_url = Some(v);
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.general
            .bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow::anyhow!("general.bind_addr is invalid: {e}"))?;
        if self.general.database_path.trim().is_empty() {
            return Err(anyhow::anyhow!("general.database_path is required"));
        }
        if self.enrichment.history_limit == 0 {
            return Err(anyhow::anyhow!("enrichment.history_limit must be > 0"));
        }
        if self.enrichment.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("enrichment.timeout_seconds must be > 0"));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".deskflow").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = DeskflowConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.general.bind_addr, "127.0.0.1:8080");
        assert!(cfg.llm.auto_reply);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: DeskflowConfig = toml::from_str(
            r#"
[llm]
gemini_api_key = "k"

[integrations]
sheet_export_url = "https://sheets.example/upsert"
"#,
        )
        .expect("parse");
        assert_eq!(cfg.llm.gemini_api_key.as_deref(), Some("k"));
        assert_eq!(cfg.llm.model, "gemini-2.0-flash-001");
        assert_eq!(cfg.enrichment.history_limit, 15);
        assert_eq!(
            cfg.integrations.sheet_export_url.as_deref(),
            Some("https://sheets.example/upsert")
        );
        assert!(cfg.integrations.search_url.is_none());
    }

    #[test]
    fn bad_bind_addr_is_rejected() {
        let cfg: DeskflowConfig = toml::from_str(
            r#"
[general]
bind_addr = "not-an-addr"
"#,
        )
        .expect("parse");
        assert!(cfg.validate().is_err());
    }
}
