use chrono::{DateTime, Utc};
use desk_channels::Channel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type SessionId = i64;
pub type MessageId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Awaiting an admin; the auto-responder answers here.
    Open,
    /// An admin has taken the conversation.
    Claimed,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Claimed => "claimed",
            SessionStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(SessionStatus::Open),
            "claimed" => Some(SessionStatus::Claimed),
            "closed" => Some(SessionStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Customer,
    Admin,
    System,
}

impl SenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderType::Customer => "customer",
            SenderType::Admin => "admin",
            SenderType::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(SenderType::Customer),
            "admin" => Some(SenderType::Admin),
            "system" => Some(SenderType::System),
            _ => None,
        }
    }
}

/// One conversation thread between one external identity and the support
/// team, on one channel. Identity (`channel`, `external_id`) is the
/// uniqueness key; the row survives close/reopen cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub channel: Channel,
    pub external_id: String,
    pub display_name: String,
    pub status: SessionStatus,
    pub current_receiver: Option<String>,
    pub previous_receiver: Option<String>,
    pub alert: bool,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub sender_type: SenderType,
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub sender_type: SenderType,
    pub content: String,
    pub image_urls: Vec<String>,
    pub sender_name: String,
}

/// Free-form extracted profile, one per session. The field set comes from
/// `FieldConfig`, not a fixed schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub session_id: SessionId,
    pub data: BTreeMap<String, String>,
}

/// One column of the extraction/export schema. `column_letter` is the
/// spreadsheet ordering key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub id: i64,
    pub column_letter: String,
    pub column_name: String,
    pub is_required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFieldConfig {
    pub column_letter: String,
    pub column_name: String,
    #[serde(default)]
    pub is_required: bool,
}

/// Denormalized session payload served to dashboards and pushed over
/// WebSocket; this is the shape the session-view cache holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: SessionId,
    pub channel: Channel,
    pub external_id: String,
    pub display_name: String,
    pub status: SessionStatus,
    pub current_receiver: Option<String>,
    pub previous_receiver: Option<String>,
    pub alert: bool,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl SessionView {
    pub fn from_parts(session: ChatSession, tag_ids: Vec<i64>) -> Self {
        Self {
            id: session.id,
            channel: session.channel,
            external_id: session.external_id,
            display_name: session.display_name,
            status: session.status,
            current_receiver: session.current_receiver,
            previous_receiver: session.previous_receiver,
            alert: session.alert,
            sla_deadline: session.sla_deadline,
            last_activity: session.last_activity,
            tag_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_sessions: u64,
    pub open: u64,
    pub claimed: u64,
    pub alerts: u64,
}

/// Frame pushed to live connections. Serialized once per delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    Message {
        message: Message,
        session: SessionView,
    },
    SessionUpdate {
        session: SessionView,
    },
    CustomerInfoUpdate {
        session_id: SessionId,
        customer_data: BTreeMap<String, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_events_serialize_with_type_tag() {
        let event = WsEvent::CustomerInfoUpdate {
            session_id: 7,
            customer_data: BTreeMap::from([("name".to_string(), "Linh".to_string())]),
        };
        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["type"], "customer_info_update");
        assert_eq!(value["session_id"], 7);
        assert_eq!(value["customer_data"]["name"], "Linh");
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            SessionStatus::Open,
            SessionStatus::Claimed,
            SessionStatus::Closed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("escalated"), None);
    }
}
