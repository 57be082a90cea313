use crate::types::{AdapterError, Channel, InboundEvent, TEXT_ONLY_NOTICE};
use serde::Deserialize;

/// Normalize a Telegram bot webhook update into an `InboundEvent`.
///
/// Only `message` updates are routed. A message with no usable text (photo,
/// sticker, voice note, ...) is replaced by the fixed text-only notice rather
/// than rejected.
pub fn parse_telegram(body: &serde_json::Value) -> Result<InboundEvent, AdapterError> {
    let update: TelegramUpdate = serde_json::from_value(body.clone())?;
    let message = update
        .message
        .ok_or(AdapterError::MissingField("message"))?;
    let sender_id = message
        .from
        .as_ref()
        .map(|user| user.id)
        .ok_or(AdapterError::MissingField("message.from.id"))?;

    Ok(InboundEvent {
        channel: Channel::Telegram,
        external_sender_id: sender_id.to_string(),
        page_id: None,
        text: extract_text(&message),
        timestamp: None,
    })
}

fn extract_text(message: &TelegramMessage) -> String {
    match message.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => TEXT_ONLY_NOTICE.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}
