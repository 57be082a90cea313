//! Field-config schema service: which named fields extraction collects and
//! the spreadsheet export emits, ordered by column letter. Read-mostly and
//! cached for a day; any mutation invalidates the cache explicitly.

use crate::models::{FieldConfig, NewFieldConfig};
use crate::store::{Cache, Store};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const FIELD_CONFIGS_CACHE_KEY: &str = "field_configs:all";
const FIELD_CONFIGS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct FieldConfigService {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

impl FieldConfigService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    pub async fn all(&self) -> Result<Vec<FieldConfig>> {
        if let Some(cached) = self.cache.get(FIELD_CONFIGS_CACHE_KEY) {
            if let Ok(configs) = serde_json::from_value::<Vec<FieldConfig>>(cached) {
                return Ok(configs);
            }
        }
        let configs = self.store.list_field_configs().await?;
        if let Ok(value) = serde_json::to_value(&configs) {
            self.cache.set(FIELD_CONFIGS_CACHE_KEY, value, FIELD_CONFIGS_TTL);
        }
        Ok(configs)
    }

    pub async fn create(&self, config: NewFieldConfig) -> Result<FieldConfig> {
        let created = self.store.create_field_config(config).await?;
        self.invalidate();
        Ok(created)
    }

    pub async fn update(&self, id: i64, config: NewFieldConfig) -> Result<Option<FieldConfig>> {
        let updated = self.store.update_field_config(id, config).await?;
        self.invalidate();
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self.store.delete_field_config(id).await?;
        self.invalidate();
        Ok(deleted)
    }

    pub fn invalidate(&self) {
        self.cache.delete(FIELD_CONFIGS_CACHE_KEY);
    }
}

/// Build the export header/row pair for a merged profile. Returns `None`
/// when the row would be empty or a required column has no value; such a
/// row is not worth a spreadsheet round trip.
pub fn build_export_row(
    configs: &[FieldConfig],
    data: &BTreeMap<String, String>,
) -> Option<(Vec<String>, Vec<String>)> {
    if configs.is_empty() {
        return None;
    }
    let mut ordered: Vec<&FieldConfig> = configs.iter().collect();
    ordered.sort_by(|a, b| a.column_letter.cmp(&b.column_letter));

    let mut headers = Vec::with_capacity(ordered.len());
    let mut row = Vec::with_capacity(ordered.len());
    for config in ordered {
        let value = data
            .get(&config.column_name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != "null" && *v != "None")
            .unwrap_or("");
        if config.is_required && value.is_empty() {
            return None;
        }
        headers.push(config.column_name.clone());
        row.push(value.to_string());
    }

    if row.iter().all(String::is_empty) {
        return None;
    }
    Some((headers, row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::sqlite::SqliteStore;

    fn config(letter: &str, name: &str, required: bool) -> FieldConfig {
        FieldConfig {
            id: 0,
            column_letter: letter.to_string(),
            column_name: name.to_string(),
            is_required: required,
        }
    }

    #[test]
    fn row_follows_column_letter_order() {
        let configs = vec![
            config("B", "phone", false),
            config("A", "name", false),
        ];
        let data = BTreeMap::from([
            ("name".to_string(), "Linh".to_string()),
            ("phone".to_string(), "0905".to_string()),
        ]);
        let (headers, row) = build_export_row(&configs, &data).expect("row");
        assert_eq!(headers, vec!["name", "phone"]);
        assert_eq!(row, vec!["Linh", "0905"]);
    }

    #[test]
    fn missing_required_value_skips_the_export() {
        let configs = vec![config("A", "name", true), config("B", "phone", false)];
        let data = BTreeMap::from([("phone".to_string(), "0905".to_string())]);
        assert!(build_export_row(&configs, &data).is_none());
    }

    #[test]
    fn null_spellings_count_as_empty() {
        let configs = vec![config("A", "name", false)];
        let data = BTreeMap::from([("name".to_string(), "None".to_string())]);
        assert!(build_export_row(&configs, &data).is_none());
    }

    #[tokio::test]
    async fn mutations_invalidate_the_cached_schema() {
        let store = Arc::new(SqliteStore::open_in_memory().await.expect("open store"));
        let service = FieldConfigService::new(store, Arc::new(MemoryCache::new()));

        assert!(service.all().await.expect("list").is_empty());
        service
            .create(NewFieldConfig {
                column_letter: "A".to_string(),
                column_name: "name".to_string(),
                is_required: true,
            })
            .await
            .expect("create");
        // A stale cache would still say "empty" here.
        assert_eq!(service.all().await.expect("list").len(), 1);
    }
}
