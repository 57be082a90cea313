//! SQLite-backed `Store`. rusqlite is synchronous, so every call hops onto
//! the blocking pool; the connection lives behind a mutex and no async lock
//! is ever held across a query.

use crate::enrichment::merge_fields;
use crate::models::{
    ChatSession, CustomerInfo, DashboardSummary, FieldConfig, Message, MessageId, NewFieldConfig,
    NewMessage, SenderType, SessionId, SessionStatus,
};
use crate::store::{MergeOutcome, Store};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use desk_channels::Channel;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path)
                .with_context(|| format!("open sqlite db at {}", path.display()))?;
            init_connection(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database; used by tests and `doctor`.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection> {
            let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
            init_connection(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("sqlite connection mutex poisoned"))?;
            f(&mut guard)
        })
        .await?
    }
}

fn init_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    channel           TEXT NOT NULL,
    external_id       TEXT NOT NULL,
    display_name      TEXT NOT NULL,
    status            TEXT NOT NULL,
    current_receiver  TEXT,
    previous_receiver TEXT,
    alert             INTEGER NOT NULL DEFAULT 0,
    sla_deadline      TEXT,
    last_activity     TEXT NOT NULL,
    UNIQUE (channel, external_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  INTEGER NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
    sender_type TEXT NOT NULL,
    content     TEXT NOT NULL,
    image_urls  TEXT,
    sender_name TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, id);

CREATE TABLE IF NOT EXISTS customer_info (
    session_id INTEGER PRIMARY KEY REFERENCES chat_sessions(id) ON DELETE CASCADE,
    data       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS field_configs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    column_letter TEXT NOT NULL UNIQUE,
    column_name   TEXT NOT NULL,
    is_required   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS session_tags (
    session_id INTEGER NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
    tag_id     INTEGER NOT NULL,
    PRIMARY KEY (session_id, tag_id)
);
"#,
    )
    .context("create schema")?;
    Ok(())
}

const SESSION_COLUMNS: &str = "id, channel, external_id, display_name, status, \
     current_receiver, previous_receiver, alert, sla_deadline, last_activity";

type SessionRow = (
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    Option<String>,
    String,
);

fn read_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn session_from_row(row: SessionRow) -> Result<ChatSession> {
    let (
        id,
        channel,
        external_id,
        display_name,
        status,
        current_receiver,
        previous_receiver,
        alert,
        sla_deadline,
        last_activity,
    ) = row;
    Ok(ChatSession {
        id,
        channel: Channel::parse(&channel)
            .ok_or_else(|| anyhow!("session {id} has unknown channel {channel:?}"))?,
        external_id,
        display_name,
        status: SessionStatus::parse(&status)
            .ok_or_else(|| anyhow!("session {id} has unknown status {status:?}"))?,
        current_receiver,
        previous_receiver,
        alert,
        sla_deadline: sla_deadline.as_deref().map(parse_ts).transpose()?,
        last_activity: parse_ts(&last_activity)?,
    })
}

type MessageRow = (
    i64,
    i64,
    String,
    String,
    Option<String>,
    String,
    String,
);

fn read_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn message_from_row(row: MessageRow) -> Result<Message> {
    let (id, session_id, sender_type, content, image_urls, sender_name, created_at) = row;
    Ok(Message {
        id,
        session_id,
        sender_type: SenderType::parse(&sender_type)
            .ok_or_else(|| anyhow!("message {id} has unknown sender type {sender_type:?}"))?,
        content,
        image_urls: match image_urls {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("message {id} image_urls payload"))?,
            None => Vec::new(),
        },
        sender_name,
        created_at: parse_ts(&created_at)?,
    })
}

fn field_config_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FieldConfig> {
    Ok(FieldConfig {
        id: row.get(0)?,
        column_letter: row.get(1)?,
        column_name: row.get(2)?,
        is_required: row.get(3)?,
    })
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("parse timestamp {raw:?}"))?
        .with_timezone(&Utc))
}

fn to_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn id_placeholders(count: usize) -> String {
    let mut out = String::new();
    for i in 1..=count {
        if i > 1 {
            out.push_str(", ");
        }
        out.push('?');
        out.push_str(&i.to_string());
    }
    out
}

fn load_session(conn: &Connection, id: SessionId) -> Result<Option<ChatSession>> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1"),
        params![id],
        read_session_row,
    )
    .optional()?
    .map(session_from_row)
    .transpose()
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_or_create_session(
        &self,
        channel: Channel,
        external_id: &str,
        display_name: &str,
    ) -> Result<ChatSession> {
        let external_id = external_id.to_string();
        let display_name = display_name.to_string();
        self.call(move |conn| {
            // Identity is the uniqueness key; losing a concurrent insert race
            // lands on the same row through the re-select.
            conn.execute(
                r#"
INSERT INTO chat_sessions (channel, external_id, display_name, status, alert, last_activity)
VALUES (?1, ?2, ?3, 'open', 0, ?4)
ON CONFLICT (channel, external_id) DO NOTHING
"#,
                params![channel.as_str(), external_id, display_name, to_ts(Utc::now())],
            )?;
            let row = conn.query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE channel = ?1 AND external_id = ?2"
                ),
                params![channel.as_str(), external_id],
                read_session_row,
            )?;
            session_from_row(row)
        })
        .await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<ChatSession>> {
        self.call(move |conn| load_session(conn, id)).await
    }

    async fn update_session(&self, session: &ChatSession) -> Result<()> {
        let session = session.clone();
        self.call(move |conn| {
            let updated = conn.execute(
                r#"
UPDATE chat_sessions
   SET display_name = ?2,
       status = ?3,
       current_receiver = ?4,
       previous_receiver = ?5,
       alert = ?6,
       sla_deadline = ?7,
       last_activity = ?8
 WHERE id = ?1
"#,
                params![
                    session.id,
                    session.display_name,
                    session.status.as_str(),
                    session.current_receiver,
                    session.previous_receiver,
                    session.alert,
                    session.sla_deadline.map(to_ts),
                    to_ts(session.last_activity),
                ],
            )?;
            if updated == 0 {
                return Err(anyhow!("session {} does not exist", session.id));
            }
            Ok(())
        })
        .await
    }

    async fn list_sessions(
        &self,
        channel: Option<Channel>,
        tag_id: Option<i64>,
    ) -> Result<Vec<ChatSession>> {
        self.call(move |conn| {
            let mut sql = String::from(
                "SELECT s.id, s.channel, s.external_id, s.display_name, s.status, \
                 s.current_receiver, s.previous_receiver, s.alert, s.sla_deadline, s.last_activity \
                 FROM chat_sessions s",
            );
            let mut values: Vec<SqlValue> = Vec::new();
            if let Some(tag_id) = tag_id {
                values.push(SqlValue::Integer(tag_id));
                sql.push_str(&format!(
                    " JOIN session_tags st ON st.session_id = s.id AND st.tag_id = ?{}",
                    values.len()
                ));
            }
            if let Some(channel) = channel {
                values.push(SqlValue::Text(channel.as_str().to_string()));
                sql.push_str(&format!(" WHERE s.channel = ?{}", values.len()));
            }
            sql.push_str(" ORDER BY s.last_activity DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), read_session_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(session_from_row).collect()
        })
        .await
    }

    async fn delete_sessions(&self, ids: &[SessionId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.call(move |conn| {
            let sql = format!(
                "DELETE FROM chat_sessions WHERE id IN ({})",
                id_placeholders(ids.len())
            );
            let deleted = conn.execute(&sql, params_from_iter(ids.iter()))?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn session_tags(&self, id: SessionId) -> Result<Vec<i64>> {
        self.call(move |conn| {
            let mut stmt = conn
                .prepare("SELECT tag_id FROM session_tags WHERE session_id = ?1 ORDER BY tag_id")?;
            let tags = stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(tags)
        })
        .await
    }

    async fn replace_session_tags(&self, id: SessionId, tag_ids: &[i64]) -> Result<()> {
        let tag_ids = tag_ids.to_vec();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM session_tags WHERE session_id = ?1", params![id])?;
            for tag_id in &tag_ids {
                tx.execute(
                    "INSERT OR IGNORE INTO session_tags (session_id, tag_id) VALUES (?1, ?2)",
                    params![id, tag_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        self.call(move |conn| {
            let created_at = Utc::now();
            let image_urls = if message.image_urls.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&message.image_urls)?)
            };
            conn.execute(
                r#"
INSERT INTO messages (session_id, sender_type, content, image_urls, sender_name, created_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
                params![
                    message.session_id,
                    message.sender_type.as_str(),
                    message.content,
                    image_urls,
                    message.sender_name,
                    to_ts(created_at),
                ],
            )?;
            Ok(Message {
                id: conn.last_insert_rowid(),
                session_id: message.session_id,
                sender_type: message.sender_type,
                content: message.content,
                image_urls: message.image_urls,
                sender_name: message.sender_name,
                created_at,
            })
        })
        .await
    }

    async fn recent_messages(&self, session_id: SessionId, limit: u32) -> Result<Vec<Message>> {
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sender_type, content, image_urls, sender_name, created_at \
                 FROM messages WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![session_id, limit], read_message_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut messages = rows
                .into_iter()
                .map(message_from_row)
                .collect::<Result<Vec<_>>>()?;
            messages.reverse();
            Ok(messages)
        })
        .await
    }

    async fn history(&self, session_id: SessionId, page: u32, limit: u32) -> Result<Vec<Message>> {
        self.call(move |conn| {
            let offset = page.saturating_sub(1) * limit;
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sender_type, content, image_urls, sender_name, created_at \
                 FROM messages WHERE session_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![session_id, limit, offset], read_message_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(message_from_row).collect()
        })
        .await
    }

    async fn delete_messages(&self, session_id: SessionId, ids: &[MessageId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();
        self.call(move |conn| {
            let sql = format!(
                "DELETE FROM messages WHERE session_id = ?1 AND id IN ({})",
                (2..=ids.len() + 1)
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let mut values: Vec<SqlValue> = vec![SqlValue::Integer(session_id)];
            values.extend(ids.iter().map(|id| SqlValue::Integer(*id)));
            let deleted = conn.execute(&sql, params_from_iter(values))?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn customer_info(&self, session_id: SessionId) -> Result<Option<CustomerInfo>> {
        self.call(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT data FROM customer_info WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .optional()?;
            match raw {
                Some(raw) => Ok(Some(CustomerInfo {
                    session_id,
                    data: serde_json::from_str(&raw).with_context(|| {
                        format!("customer_info payload for session {session_id}")
                    })?,
                })),
                None => Ok(None),
            }
        })
        .await
    }

    async fn merge_customer_info(
        &self,
        session_id: SessionId,
        extracted: &BTreeMap<String, Option<String>>,
    ) -> Result<MergeOutcome> {
        let extracted = extracted.clone();
        self.call(move |conn| {
            // Merge and alert-flag write commit together or not at all.
            let tx = conn.transaction()?;
            let existing: BTreeMap<String, String> = tx
                .query_row(
                    "SELECT data FROM customer_info WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?
                .unwrap_or_default();

            let (merged, changed) = merge_fields(&existing, &extracted);
            if changed {
                tx.execute(
                    r#"
INSERT INTO customer_info (session_id, data)
VALUES (?1, ?2)
ON CONFLICT (session_id) DO UPDATE SET data = excluded.data
"#,
                    params![session_id, serde_json::to_string(&merged)?],
                )?;
                tx.execute(
                    "UPDATE chat_sessions SET alert = 1 WHERE id = ?1",
                    params![session_id],
                )?;
            }
            tx.commit()?;
            Ok(MergeOutcome {
                changed,
                data: merged,
            })
        })
        .await
    }

    async fn list_field_configs(&self) -> Result<Vec<FieldConfig>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, column_letter, column_name, is_required \
                 FROM field_configs ORDER BY column_letter",
            )?;
            let configs = stmt
                .query_map([], field_config_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(configs)
        })
        .await
    }

    async fn create_field_config(&self, config: NewFieldConfig) -> Result<FieldConfig> {
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO field_configs (column_letter, column_name, is_required) \
                 VALUES (?1, ?2, ?3)",
                params![config.column_letter, config.column_name, config.is_required],
            )?;
            Ok(FieldConfig {
                id: conn.last_insert_rowid(),
                column_letter: config.column_letter,
                column_name: config.column_name,
                is_required: config.is_required,
            })
        })
        .await
    }

    async fn update_field_config(
        &self,
        id: i64,
        config: NewFieldConfig,
    ) -> Result<Option<FieldConfig>> {
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE field_configs SET column_letter = ?2, column_name = ?3, is_required = ?4 \
                 WHERE id = ?1",
                params![id, config.column_letter, config.column_name, config.is_required],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            Ok(Some(FieldConfig {
                id,
                column_letter: config.column_letter,
                column_name: config.column_name,
                is_required: config.is_required,
            }))
        })
        .await
    }

    async fn delete_field_config(&self, id: i64) -> Result<bool> {
        self.call(move |conn| {
            let deleted = conn.execute("DELETE FROM field_configs WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        self.call(|conn| {
            let summary = conn.query_row(
                r#"
SELECT COUNT(*),
       COALESCE(SUM(status = 'open'), 0),
       COALESCE(SUM(status = 'claimed'), 0),
       COALESCE(SUM(alert), 0)
  FROM chat_sessions
"#,
                [],
                |row| {
                    Ok(DashboardSummary {
                        total_sessions: row.get::<_, i64>(0)? as u64,
                        open: row.get::<_, i64>(1)? as u64,
                        claimed: row.get::<_, i64>(2)? as u64,
                        alerts: row.get::<_, i64>(3)? as u64,
                    })
                },
            )?;
            Ok(summary)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::open_in_memory().await.expect("open store")
    }

    fn new_message(session_id: SessionId, content: &str) -> NewMessage {
        NewMessage {
            session_id,
            sender_type: SenderType::Customer,
            content: content.to_string(),
            image_urls: vec![],
            sender_name: "Khách".to_string(),
        }
    }

    #[tokio::test]
    async fn identity_is_the_uniqueness_key() {
        let store = store().await;
        let first = store
            .get_or_create_session(Channel::Telegram, "42", "42")
            .await
            .expect("create");
        let second = store
            .get_or_create_session(Channel::Telegram, "42", "someone else")
            .await
            .expect("re-fetch");
        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "42", "existing row wins");

        let other_channel = store
            .get_or_create_session(Channel::Zalo, "42", "42")
            .await
            .expect("create on other channel");
        assert_ne!(first.id, other_channel.id);
    }

    #[tokio::test]
    async fn messages_round_trip_in_insertion_order() {
        let store = store().await;
        let session = store
            .get_or_create_session(Channel::Web, "w1", "Khách")
            .await
            .expect("create");
        for text in ["one", "two", "three"] {
            store
                .insert_message(new_message(session.id, text))
                .await
                .expect("insert");
        }

        let history = store.history(session.id, 1, 10).await.expect("history");
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);

        let recent = store.recent_messages(session.id, 2).await.expect("recent");
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"], "oldest-first window");
    }

    #[tokio::test]
    async fn deleting_a_session_cascades_to_messages_and_info() {
        let store = store().await;
        let session = store
            .get_or_create_session(Channel::Web, "w1", "Khách")
            .await
            .expect("create");
        store
            .insert_message(new_message(session.id, "hello"))
            .await
            .expect("insert");
        store
            .merge_customer_info(
                session.id,
                &BTreeMap::from([("name".to_string(), Some("Linh".to_string()))]),
            )
            .await
            .expect("merge");

        let deleted = store.delete_sessions(&[session.id]).await.expect("delete");
        assert_eq!(deleted, 1);
        assert!(store.history(session.id, 1, 10).await.expect("history").is_empty());
        assert!(store.customer_info(session.id).await.expect("info").is_none());
    }

    #[tokio::test]
    async fn merge_raises_alert_only_on_change() {
        let store = store().await;
        let session = store
            .get_or_create_session(Channel::Web, "w1", "Khách")
            .await
            .expect("create");

        let outcome = store
            .merge_customer_info(
                session.id,
                &BTreeMap::from([("phone".to_string(), Some("0905".to_string()))]),
            )
            .await
            .expect("merge");
        assert!(outcome.changed);
        let session = store
            .get_session(session.id)
            .await
            .expect("get")
            .expect("exists");
        assert!(session.alert);

        // Same values again: no change, alert untouched even after reset.
        let mut cleared = session.clone();
        cleared.alert = false;
        store.update_session(&cleared).await.expect("clear alert");
        let outcome = store
            .merge_customer_info(
                session.id,
                &BTreeMap::from([("phone".to_string(), Some("0905".to_string()))]),
            )
            .await
            .expect("merge again");
        assert!(!outcome.changed);
        let session = store
            .get_session(session.id)
            .await
            .expect("get")
            .expect("exists");
        assert!(!session.alert);
    }

    #[tokio::test]
    async fn field_configs_are_ordered_by_column_letter() {
        let store = store().await;
        for (letter, name, required) in [("B", "phone", true), ("A", "name", true), ("C", "size", false)] {
            store
                .create_field_config(NewFieldConfig {
                    column_letter: letter.to_string(),
                    column_name: name.to_string(),
                    is_required: required,
                })
                .await
                .expect("create config");
        }
        let configs = store.list_field_configs().await.expect("list");
        let names: Vec<&str> = configs.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["name", "phone", "size"]);
    }

    #[tokio::test]
    async fn tag_filter_narrows_session_listing() {
        let store = store().await;
        let tagged = store
            .get_or_create_session(Channel::Web, "w1", "Khách")
            .await
            .expect("create");
        let untagged = store
            .get_or_create_session(Channel::Web, "w2", "Khách")
            .await
            .expect("create");
        store
            .replace_session_tags(tagged.id, &[7])
            .await
            .expect("tag");

        let all = store.list_sessions(None, None).await.expect("list");
        assert_eq!(all.len(), 2);
        let filtered = store.list_sessions(None, Some(7)).await.expect("filtered");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, tagged.id);
        assert_ne!(filtered[0].id, untagged.id);
    }
}
