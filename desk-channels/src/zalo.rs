use crate::types::{AdapterError, Channel, InboundEvent, TEXT_ONLY_NOTICE};
use serde::Deserialize;

/// Normalize a Zalo OA webhook body into an `InboundEvent`.
///
/// Zalo tags each callback with `event_name`; only `user_send_text` carries
/// text, every other user event (images, stickers, files) gets the notice.
pub fn parse_zalo(body: &serde_json::Value) -> Result<InboundEvent, AdapterError> {
    let payload: ZaloPayload = serde_json::from_value(body.clone())?;
    let sender = payload.sender.ok_or(AdapterError::MissingField("sender.id"))?;

    let text = if payload.event_name.as_deref() == Some("user_send_text") {
        match payload.message.and_then(|m| m.text).map(|t| t.trim().to_string()) {
            Some(text) if !text.is_empty() => text,
            _ => TEXT_ONLY_NOTICE.to_string(),
        }
    } else {
        TEXT_ONLY_NOTICE.to_string()
    };

    Ok(InboundEvent {
        channel: Channel::Zalo,
        external_sender_id: sender.id,
        page_id: None,
        text,
        timestamp: None,
    })
}

#[derive(Debug, Deserialize)]
struct ZaloPayload {
    #[serde(default)]
    event_name: Option<String>,
    #[serde(default)]
    sender: Option<ZaloSender>,
    #[serde(default)]
    message: Option<ZaloMessage>,
}

#[derive(Debug, Deserialize)]
struct ZaloSender {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ZaloMessage {
    #[serde(default)]
    text: Option<String>,
}
