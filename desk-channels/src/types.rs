use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Notice substituted for any inbound payload that carries no text content
/// (photos, videos, stickers, ...). Product copy; must match across channels.
pub const TEXT_ONLY_NOTICE: &str =
    "Hiện tại hệ thống chỉ hỗ trợ tin nhắn dạng text. Vui lòng gửi lại tin nhắn bằng văn bản.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Web,
    Telegram,
    Facebook,
    Zalo,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::Telegram => "telegram",
            Channel::Facebook => "facebook",
            Channel::Zalo => "zalo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "web" => Some(Channel::Web),
            "telegram" => Some(Channel::Telegram),
            "facebook" => Some(Channel::Facebook),
            "zalo" => Some(Channel::Zalo),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical inbound shape every adapter normalizes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub channel: Channel,
    /// Platform-specific sender identity (Telegram user id, Messenger PSID, ...).
    pub external_sender_id: String,
    /// Messenger page id when the platform scopes senders to a page.
    #[serde(default)]
    pub page_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("payload missing required field: {0}")]
    MissingField(&'static str),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}
