//! Live connection registry: one customer connection per session, an
//! unordered admin pool, best-effort delivery.
//!
//! Connections are held as unbounded senders of serialized frames; the
//! socket task on the other end pumps them onto the wire. A failed send
//! means the receiver is gone, so the entry is evicted rather than the
//! error surfaced.

use crate::models::{SessionId, WsEvent};
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type FrameSender = mpsc::UnboundedSender<String>;

struct CustomerConn {
    conn_id: Uuid,
    tx: FrameSender,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    customers: DashMap<SessionId, CustomerConn>,
    admins: DashMap<Uuid, FrameSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
            admins: DashMap::new(),
        }
    }

    /// Register the customer connection for a session, replacing any prior
    /// one. Dropping the replaced sender closes its pump, which ends the
    /// old socket, so a reconnect never duplicates delivery.
    pub fn connect_customer(&self, session_id: SessionId, tx: FrameSender) -> Uuid {
        let conn_id = Uuid::new_v4();
        if let Some(prior) = self.customers.insert(session_id, CustomerConn { conn_id, tx }) {
            tracing::debug!(session_id, prior_conn = %prior.conn_id, "evicted prior customer connection");
        }
        conn_id
    }

    /// Remove the customer entry only if it still belongs to `conn_id`;
    /// a disconnect racing a reconnect must not evict the new connection.
    pub fn disconnect_customer(&self, session_id: SessionId, conn_id: Uuid) {
        self.customers
            .remove_if(&session_id, |_, conn| conn.conn_id == conn_id);
    }

    pub fn connect_admin(&self, tx: FrameSender) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.admins.insert(conn_id, tx);
        conn_id
    }

    pub fn disconnect_admin(&self, conn_id: Uuid) {
        self.admins.remove(&conn_id);
    }

    pub fn customer_online(&self, session_id: SessionId) -> bool {
        self.customers.contains_key(&session_id)
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }

    /// Deliver to the session's customer connection if one is registered.
    /// Offline customers are a silent no-op: the message is already durable
    /// and retrievable through history.
    pub fn send_to_customer(&self, session_id: SessionId, event: &WsEvent) {
        let Some(frame) = serialize_frame(event) else {
            return;
        };
        let gone = match self.customers.get(&session_id) {
            Some(conn) => conn.tx.send(frame).is_err(),
            None => false,
        };
        if gone {
            tracing::debug!(session_id, "customer connection gone; evicting");
            self.customers.remove(&session_id);
        }
    }

    /// Deliver to every admin connection. Membership is snapshotted first so
    /// concurrent connects/disconnects cannot stall or skip the fan-out; a
    /// dead connection is evicted and the remaining sends continue.
    pub fn broadcast_to_admins(&self, event: &WsEvent) {
        let Some(frame) = serialize_frame(event) else {
            return;
        };
        let snapshot: Vec<(Uuid, FrameSender)> = self
            .admins
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (conn_id, tx) in snapshot {
            if tx.send(frame.clone()).is_err() {
                tracing::debug!(admin_conn = %conn_id, "admin connection gone; evicting");
                self.admins.remove(&conn_id);
            }
        }
    }
}

fn serialize_frame(event: &WsEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(%e, "failed to serialize ws event");
            None
        }
    }
}
