//! Bidirectional message routing.
//!
//! `ingest_*` is the one write path for chat traffic: resolve the session,
//! make the message durable, fan out to live connections, then hand the
//! session to the enrichment coordinator. Durability is the only failure
//! that reaches the caller; delivery and enrichment problems are contained
//! and logged.

use crate::enrichment::EnrichmentCoordinator;
use crate::error::{Result, RoutingError};
use crate::models::{Message, NewMessage, SenderType, SessionId, SessionStatus, SessionView, WsEvent};
use crate::registry::ConnectionRegistry;
use crate::responder::AutoReplier;
use crate::sessions::SessionStore;
use crate::store::Store;
use desk_channels::InboundEvent;
use std::sync::Arc;

const AUTO_REPLY_SENDER: &str = "Trợ lý";

pub struct MessageRouter {
    store: Arc<dyn Store>,
    sessions: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
    enrichment: Arc<EnrichmentCoordinator>,
    responder: Option<Arc<AutoReplier>>,
}

impl MessageRouter {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<SessionStore>,
        registry: Arc<ConnectionRegistry>,
        enrichment: Arc<EnrichmentCoordinator>,
        responder: Option<Arc<AutoReplier>>,
    ) -> Self {
        Self {
            store,
            sessions,
            registry,
            enrichment,
            responder,
        }
    }

    /// Ingest a normalized webhook event: resolves (or creates) the session
    /// for the external identity, then follows the customer-message path.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn ingest_event(self: &Arc<Self>, event: InboundEvent) -> Result<Message> {
        let session = self
            .sessions
            .get_or_create(event.channel, &event.external_sender_id, &event.external_sender_id)
            .await?;
        self.ingest_customer(session.id, &event.text, vec![]).await
    }

    /// Ingest a customer message on a known session (web widget socket).
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn ingest_customer_message(
        self: &Arc<Self>,
        session_id: SessionId,
        text: &str,
        image_urls: Vec<String>,
    ) -> Result<Message> {
        self.ingest_customer(session_id, text, image_urls).await
    }

    async fn ingest_customer(
        self: &Arc<Self>,
        session_id: SessionId,
        text: &str,
        image_urls: Vec<String>,
    ) -> Result<Message> {
        let mut session = self.sessions.get(session_id).await?;
        self.sessions.note_customer_activity(&mut session).await?;

        // Durability before delivery: if this write fails the whole ingest
        // fails and nothing is fanned out.
        let message = self
            .store
            .insert_message(NewMessage {
                session_id,
                sender_type: SenderType::Customer,
                content: text.to_string(),
                image_urls,
                sender_name: session.display_name.clone(),
            })
            .await
            .map_err(RoutingError::durability)?;

        let view = self.sessions.view(session_id).await?;
        self.deliver(&view, &message);
        self.enrichment.schedule(session_id);

        if session.status == SessionStatus::Open {
            self.spawn_auto_reply(session_id, text.to_string());
        }
        Ok(message)
    }

    /// Ingest an admin reply. Replying claims the session (receiver shift,
    /// SLA extension) before the message is persisted and fanned out.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn ingest_admin_message(
        self: &Arc<Self>,
        session_id: SessionId,
        admin: &str,
        text: &str,
        image_urls: Vec<String>,
    ) -> Result<Message> {
        let view = self.sessions.claim(session_id, admin).await?;
        let message = self
            .store
            .insert_message(NewMessage {
                session_id,
                sender_type: SenderType::Admin,
                content: text.to_string(),
                image_urls,
                sender_name: admin.to_string(),
            })
            .await
            .map_err(RoutingError::durability)?;

        self.deliver(&view, &message);
        Ok(message)
    }

    /// Fan a message out to every admin viewer and the originating customer
    /// connection. Both are attempted regardless of the other; the registry
    /// contains per-recipient failures.
    fn deliver(&self, view: &SessionView, message: &Message) {
        let event = WsEvent::Message {
            message: message.clone(),
            session: view.clone(),
        };
        self.registry.broadcast_to_admins(&event);
        self.registry.send_to_customer(view.id, &event);
    }

    fn spawn_auto_reply(self: &Arc<Self>, session_id: SessionId, query: String) {
        let Some(responder) = self.responder.clone() else {
            return;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match responder.reply(session_id, &query).await {
                Ok(reply) => {
                    if let Err(e) = this.persist_and_deliver_reply(session_id, reply).await {
                        tracing::warn!(%e, session_id, "auto-reply delivery failed");
                    }
                }
                Err(e) => tracing::warn!(%e, session_id, "auto-reply generation failed"),
            }
        });
    }

    async fn persist_and_deliver_reply(
        &self,
        session_id: SessionId,
        reply: crate::responder::Reply,
    ) -> Result<()> {
        let message = self
            .store
            .insert_message(NewMessage {
                session_id,
                sender_type: SenderType::System,
                content: reply.text,
                image_urls: reply.links,
                sender_name: AUTO_REPLY_SENDER.to_string(),
            })
            .await
            .map_err(RoutingError::durability)?;
        let view = self.sessions.view(session_id).await?;
        self.deliver(&view, &message);
        Ok(())
    }

    /// Explicit admin claim; the updated session is pushed to every admin
    /// viewer so dashboards converge immediately.
    pub async fn claim_session(&self, session_id: SessionId, admin: &str) -> Result<SessionView> {
        let view = self.sessions.claim(session_id, admin).await?;
        self.registry
            .broadcast_to_admins(&WsEvent::SessionUpdate { session: view.clone() });
        Ok(view)
    }

    pub async fn close_session(&self, session_id: SessionId) -> Result<SessionView> {
        let view = self.sessions.close(session_id).await?;
        self.registry
            .broadcast_to_admins(&WsEvent::SessionUpdate { session: view.clone() });
        Ok(view)
    }

    pub async fn update_session_tags(
        &self,
        session_id: SessionId,
        tag_ids: &[i64],
    ) -> Result<SessionView> {
        let view = self.sessions.update_tags(session_id, tag_ids).await?;
        self.registry
            .broadcast_to_admins(&WsEvent::SessionUpdate { session: view.clone() });
        Ok(view)
    }

    pub async fn bulk_delete_sessions(&self, ids: &[SessionId]) -> Result<u64> {
        self.sessions.bulk_delete(ids).await
    }

    pub async fn bulk_delete_messages(
        &self,
        session_id: SessionId,
        ids: &[i64],
    ) -> Result<u64> {
        self.sessions.get(session_id).await?;
        self.store
            .delete_messages(session_id, ids)
            .await
            .map_err(RoutingError::durability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::enrichment::EnrichmentConfig;
    use crate::fields::FieldConfigService;
    use crate::sqlite::SqliteStore;
    use crate::store::{ContentGenerator, NoopSheetExporter, NoopSimilaritySearch};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use desk_channels::Channel;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct SilentGenerator;

    #[async_trait]
    impl ContentGenerator for SilentGenerator {
        async fn generate(&self, _prompt: &str) -> AnyResult<String> {
            Ok("{}".to_string())
        }
    }

    struct CannedGenerator(String);

    #[async_trait]
    impl ContentGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> AnyResult<String> {
            Ok(self.0.clone())
        }
    }

    struct Stack {
        router: Arc<MessageRouter>,
        sessions: Arc<SessionStore>,
        store: Arc<SqliteStore>,
        registry: Arc<ConnectionRegistry>,
    }

    async fn stack(responder_output: Option<&str>) -> Stack {
        let store = Arc::new(SqliteStore::open_in_memory().await.expect("open store"));
        let cache = Arc::new(MemoryCache::new());
        let sessions = Arc::new(SessionStore::new(store.clone(), cache.clone()));
        let registry = Arc::new(ConnectionRegistry::new());
        let fields = Arc::new(FieldConfigService::new(store.clone(), cache));
        let enrichment = Arc::new(EnrichmentCoordinator::new(
            store.clone(),
            sessions.clone(),
            registry.clone(),
            fields.clone(),
            Arc::new(SilentGenerator),
            Arc::new(NoopSheetExporter),
            EnrichmentConfig::default(),
        ));
        let responder = responder_output.map(|output| {
            Arc::new(AutoReplier::new(
                store.clone(),
                fields.clone(),
                Arc::new(CannedGenerator(output.to_string())),
                Arc::new(NoopSimilaritySearch),
            ))
        });
        let router = Arc::new(MessageRouter::new(
            store.clone(),
            sessions.clone(),
            registry.clone(),
            enrichment,
            responder,
        ));
        Stack {
            router,
            sessions,
            store,
            registry,
        }
    }

    fn frames(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<serde_json::Value> {
        let mut out = vec![];
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).expect("frame is json"));
        }
        out
    }

    #[tokio::test]
    async fn sequential_messages_round_trip_in_order() {
        let stack = stack(None).await;
        let session = stack.sessions.create_web().await.expect("create");
        stack.sessions.claim(session.id, "Linh").await.expect("claim");

        let (admin_tx, mut admin_rx) = mpsc::unbounded_channel();
        stack.registry.connect_admin(admin_tx);

        for text in ["first", "second", "third"] {
            stack
                .router
                .ingest_customer_message(session.id, text, vec![])
                .await
                .expect("ingest");
        }

        let history = stack
            .store
            .history(session.id, 1, 10)
            .await
            .expect("history");
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);

        let delivered: Vec<String> = frames(&mut admin_rx)
            .into_iter()
            .filter(|f| f["type"] == "message")
            .map(|f| f["message"]["content"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(delivered, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn claim_then_admin_reply_reaches_customer_once_and_each_admin_once() {
        let stack = stack(None).await;
        let created = stack.sessions.create_web().await.expect("create");

        let (customer_tx, mut customer_rx) = mpsc::unbounded_channel();
        stack.registry.connect_customer(created.id, customer_tx);
        let (admin_a_tx, mut admin_a_rx) = mpsc::unbounded_channel();
        let (admin_b_tx, mut admin_b_rx) = mpsc::unbounded_channel();
        stack.registry.connect_admin(admin_a_tx);
        stack.registry.connect_admin(admin_b_tx);

        stack
            .router
            .ingest_customer_message(created.id, "Do you have size M?", vec![])
            .await
            .expect("ingest customer");
        let view = stack
            .router
            .claim_session(created.id, "Linh")
            .await
            .expect("claim");
        assert_eq!(view.status, SessionStatus::Claimed);
        assert_eq!(view.current_receiver.as_deref(), Some("Linh"));
        assert_eq!(view.previous_receiver, None);

        stack
            .router
            .ingest_admin_message(created.id, "Linh", "Yes, in stock.", vec![])
            .await
            .expect("ingest admin");

        let customer_frames = frames(&mut customer_rx);
        let replies: Vec<_> = customer_frames
            .iter()
            .filter(|f| f["message"]["content"] == "Yes, in stock.")
            .collect();
        assert_eq!(replies.len(), 1, "customer gets exactly one copy");

        for rx in [&mut admin_a_rx, &mut admin_b_rx] {
            let admin_frames = frames(rx);
            let copies = admin_frames
                .iter()
                .filter(|f| f["message"]["content"] == "Yes, in stock.")
                .count();
            assert_eq!(copies, 1, "each admin gets exactly one copy");
        }
    }

    #[tokio::test]
    async fn webhook_events_reuse_the_identity_session() {
        let stack = stack(None).await;
        let event = InboundEvent {
            channel: Channel::Telegram,
            external_sender_id: "42".to_string(),
            page_id: None,
            text: "hello".to_string(),
            timestamp: None,
        };
        let first = stack.router.ingest_event(event.clone()).await.expect("ingest");
        let second = stack.router.ingest_event(event).await.expect("ingest again");
        assert_eq!(first.session_id, second.session_id);
    }

    #[tokio::test]
    async fn customer_message_reopens_a_closed_session() {
        let stack = stack(None).await;
        let created = stack.sessions.create_web().await.expect("create");
        stack.router.close_session(created.id).await.expect("close");

        stack
            .router
            .ingest_customer_message(created.id, "anyone there?", vec![])
            .await
            .expect("ingest");
        let view = stack.sessions.view(created.id).await.expect("view");
        assert_eq!(view.status, SessionStatus::Open);
    }

    #[tokio::test]
    async fn admin_message_on_unknown_session_is_not_found() {
        let stack = stack(None).await;
        assert!(matches!(
            stack
                .router
                .ingest_admin_message(404, "Linh", "hi", vec![])
                .await,
            Err(RoutingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn open_sessions_get_an_auto_reply() {
        let stack = stack(Some(r#"{"text": "Dạ, còn size M ạ.", "links": []}"#)).await;
        let created = stack.sessions.create_web().await.expect("create");
        let (customer_tx, mut customer_rx) = mpsc::unbounded_channel();
        stack.registry.connect_customer(created.id, customer_tx);

        stack
            .router
            .ingest_customer_message(created.id, "Còn size M không?", vec![])
            .await
            .expect("ingest");

        // The reply task runs off the ingest path; give it a beat.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let history = stack
            .store
            .history(created.id, 1, 10)
            .await
            .expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].sender_type, SenderType::System);
        assert_eq!(history[1].content, "Dạ, còn size M ạ.");

        let delivered = frames(&mut customer_rx);
        assert!(
            delivered
                .iter()
                .any(|f| f["message"]["content"] == "Dạ, còn size M ạ."),
            "auto-reply delivered to the customer connection"
        );
    }

    #[tokio::test]
    async fn claimed_sessions_do_not_auto_reply() {
        let stack = stack(Some(r#"{"text": "bot", "links": []}"#)).await;
        let created = stack.sessions.create_web().await.expect("create");
        stack
            .router
            .claim_session(created.id, "Linh")
            .await
            .expect("claim");

        stack
            .router
            .ingest_customer_message(created.id, "hi", vec![])
            .await
            .expect("ingest");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let history = stack
            .store
            .history(created.id, 1, 10)
            .await
            .expect("history");
        assert_eq!(history.len(), 1, "no system reply on a claimed session");
    }
}
