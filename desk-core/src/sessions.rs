//! Authoritative session state over the persistence collaborator, with a
//! short-TTL cache of the denormalized view served to dashboards and
//! broadcast payloads. Every mutation refreshes the cache entry before
//! returning so newly connecting admins never see stale receiver/status
//! data.

use crate::error::{Result, RoutingError};
use crate::models::{ChatSession, SessionId, SessionStatus, SessionView};
use crate::store::{Cache, Store};
use chrono::{Duration as ChronoDuration, Utc};
use desk_channels::Channel;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SESSION_VIEW_TTL: Duration = Duration::from_secs(300);

/// How long an admin claim is considered fresh on staleness dashboards.
fn claim_sla() -> ChronoDuration {
    ChronoDuration::hours(1)
}

pub struct SessionStore {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

fn cache_key(id: SessionId) -> String {
    format!("session:{id}")
}

impl SessionStore {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { store, cache }
    }

    /// Existing open conversation for this identity, or a fresh one. The
    /// store resolves concurrent creates for the same identity to one row.
    pub async fn get_or_create(
        &self,
        channel: Channel,
        external_id: &str,
        display_name: &str,
    ) -> Result<ChatSession> {
        self.store
            .get_or_create_session(channel, external_id, display_name)
            .await
            .map_err(RoutingError::durability)
    }

    /// Create a web-widget session; the generated identity doubles as the
    /// external id on channel `web`.
    pub async fn create_web(&self) -> Result<ChatSession> {
        let external_id = Uuid::new_v4().to_string();
        let display_name = format!("Khách web {}", &external_id[..8]);
        self.get_or_create(Channel::Web, &external_id, &display_name)
            .await
    }

    pub async fn get(&self, id: SessionId) -> Result<ChatSession> {
        self.store
            .get_session(id)
            .await
            .map_err(RoutingError::durability)?
            .ok_or_else(|| RoutingError::NotFound(format!("session {id}")))
    }

    /// Read-through cached view.
    pub async fn view(&self, id: SessionId) -> Result<SessionView> {
        if let Some(cached) = self.cache.get(&cache_key(id)) {
            if let Ok(view) = serde_json::from_value::<SessionView>(cached) {
                return Ok(view);
            }
        }
        self.refresh_view(id).await
    }

    /// Rebuild the denormalized view from the store and cache it.
    pub async fn refresh_view(&self, id: SessionId) -> Result<SessionView> {
        let session = self.get(id).await?;
        let tag_ids = self
            .store
            .session_tags(id)
            .await
            .map_err(RoutingError::durability)?;
        let view = SessionView::from_parts(session, tag_ids);
        if let Ok(value) = serde_json::to_value(&view) {
            self.cache.set(&cache_key(id), value, SESSION_VIEW_TTL);
        }
        Ok(view)
    }

    pub fn invalidate(&self, id: SessionId) {
        self.cache.delete(&cache_key(id));
    }

    /// Admin takes the conversation: receiver shift, status to claimed, SLA
    /// marker extended. Last write wins under concurrent claims; the losing
    /// admin observes the winner on the next read.
    pub async fn claim(&self, id: SessionId, admin: &str) -> Result<SessionView> {
        let mut session = self.get(id).await?;
        session.previous_receiver = session.current_receiver.take();
        session.current_receiver = Some(admin.to_string());
        session.status = SessionStatus::Claimed;
        session.sla_deadline = Some(Utc::now() + claim_sla());
        session.last_activity = Utc::now();
        self.store
            .update_session(&session)
            .await
            .map_err(RoutingError::durability)?;
        self.refresh_view(id).await
    }

    pub async fn close(&self, id: SessionId) -> Result<SessionView> {
        let mut session = self.get(id).await?;
        session.status = SessionStatus::Closed;
        session.last_activity = Utc::now();
        self.store
            .update_session(&session)
            .await
            .map_err(RoutingError::durability)?;
        self.refresh_view(id).await
    }

    /// Record inbound customer activity: reopen a closed conversation, bump
    /// the activity timestamp, and keep the staleness marker moving while an
    /// admin holds the session.
    pub async fn note_customer_activity(&self, session: &mut ChatSession) -> Result<()> {
        if session.status == SessionStatus::Closed {
            session.status = SessionStatus::Open;
        }
        if session.status == SessionStatus::Claimed {
            session.sla_deadline = Some(Utc::now() + claim_sla());
        }
        session.last_activity = Utc::now();
        self.store
            .update_session(session)
            .await
            .map_err(RoutingError::durability)?;
        self.refresh_view(session.id).await?;
        Ok(())
    }

    pub async fn update_tags(&self, id: SessionId, tag_ids: &[i64]) -> Result<SessionView> {
        // Ensure the session exists before touching the tag table.
        self.get(id).await?;
        self.store
            .replace_session_tags(id, tag_ids)
            .await
            .map_err(RoutingError::durability)?;
        self.refresh_view(id).await
    }

    pub async fn clear_alert(&self, id: SessionId) -> Result<SessionView> {
        let mut session = self.get(id).await?;
        session.alert = false;
        self.store
            .update_session(&session)
            .await
            .map_err(RoutingError::durability)?;
        self.refresh_view(id).await
    }

    pub async fn bulk_delete(&self, ids: &[SessionId]) -> Result<u64> {
        let deleted = self
            .store
            .delete_sessions(ids)
            .await
            .map_err(RoutingError::durability)?;
        for id in ids {
            self.invalidate(*id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::sqlite::SqliteStore;

    async fn sessions() -> SessionStore {
        let store = SqliteStore::open_in_memory().await.expect("open store");
        SessionStore::new(Arc::new(store), Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn claim_shifts_receivers_and_extends_sla() {
        let sessions = sessions().await;
        let session = sessions.create_web().await.expect("create");
        assert_eq!(session.status, SessionStatus::Open);

        let view = sessions.claim(session.id, "Linh").await.expect("claim");
        assert_eq!(view.status, SessionStatus::Claimed);
        assert_eq!(view.current_receiver.as_deref(), Some("Linh"));
        assert_eq!(view.previous_receiver, None);
        assert!(view.sla_deadline.expect("sla set") > Utc::now());

        let view = sessions.claim(session.id, "Minh").await.expect("reclaim");
        assert_eq!(view.current_receiver.as_deref(), Some("Minh"));
        assert_eq!(view.previous_receiver.as_deref(), Some("Linh"));
    }

    #[tokio::test]
    async fn cached_view_reflects_mutations_immediately() {
        let sessions = sessions().await;
        let session = sessions.create_web().await.expect("create");

        // Prime the cache, then mutate; the stale entry must not survive.
        let view = sessions.view(session.id).await.expect("view");
        assert_eq!(view.current_receiver, None);
        sessions.claim(session.id, "Linh").await.expect("claim");
        let view = sessions.view(session.id).await.expect("view after claim");
        assert_eq!(view.current_receiver.as_deref(), Some("Linh"));
    }

    #[tokio::test]
    async fn customer_activity_reopens_a_closed_session() {
        let sessions = sessions().await;
        let created = sessions.create_web().await.expect("create");
        sessions.close(created.id).await.expect("close");

        let mut session = sessions.get(created.id).await.expect("get");
        assert_eq!(session.status, SessionStatus::Closed);
        sessions
            .note_customer_activity(&mut session)
            .await
            .expect("activity");
        assert_eq!(session.status, SessionStatus::Open);
        let view = sessions.view(created.id).await.expect("view");
        assert_eq!(view.status, SessionStatus::Open);
    }

    #[tokio::test]
    async fn tags_replace_the_previous_set() {
        let sessions = sessions().await;
        let session = sessions.create_web().await.expect("create");
        let view = sessions
            .update_tags(session.id, &[3, 1])
            .await
            .expect("tag");
        assert_eq!(view.tag_ids, vec![1, 3]);
        let view = sessions.update_tags(session.id, &[2]).await.expect("retag");
        assert_eq!(view.tag_ids, vec![2]);
        assert!(matches!(
            sessions.update_tags(999, &[1]).await,
            Err(RoutingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn bulk_delete_reports_count_and_drops_cache() {
        let sessions = sessions().await;
        let a = sessions.create_web().await.expect("create a");
        let b = sessions.create_web().await.expect("create b");
        sessions.view(a.id).await.expect("prime cache");

        let deleted = sessions.bulk_delete(&[a.id, b.id]).await.expect("delete");
        assert_eq!(deleted, 2);
        assert!(matches!(
            sessions.view(a.id).await,
            Err(RoutingError::NotFound(_))
        ));
    }
}
