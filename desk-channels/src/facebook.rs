use crate::types::{AdapterError, Channel, InboundEvent, TEXT_ONLY_NOTICE};
use chrono::DateTime;
use serde::Deserialize;

/// Normalize a Messenger webhook body into an `InboundEvent`.
///
/// Messenger wraps events in `entry[].messaging[]`; the first messaging event
/// of the first entry is routed, matching the page-subscription delivery
/// shape. Attachment-only messages get the text-only notice.
pub fn parse_facebook(body: &serde_json::Value) -> Result<InboundEvent, AdapterError> {
    let payload: FacebookPayload = serde_json::from_value(body.clone())?;
    let entry = payload
        .entry
        .into_iter()
        .next()
        .ok_or(AdapterError::MissingField("entry"))?;
    let event = entry
        .messaging
        .into_iter()
        .next()
        .ok_or(AdapterError::MissingField("entry.messaging"))?;

    let text = match event.message.and_then(|m| m.text).map(|t| t.trim().to_string()) {
        Some(text) if !text.is_empty() => text,
        _ => TEXT_ONLY_NOTICE.to_string(),
    };

    Ok(InboundEvent {
        channel: Channel::Facebook,
        external_sender_id: event.sender.id,
        page_id: entry.id,
        text,
        timestamp: event.timestamp.and_then(DateTime::from_timestamp_millis),
    })
}

#[derive(Debug, Deserialize)]
struct FacebookPayload {
    #[serde(default)]
    entry: Vec<FacebookEntry>,
}

#[derive(Debug, Deserialize)]
struct FacebookEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    messaging: Vec<FacebookMessaging>,
}

#[derive(Debug, Deserialize)]
struct FacebookMessaging {
    sender: FacebookSender,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    message: Option<FacebookMessage>,
}

#[derive(Debug, Deserialize)]
struct FacebookSender {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FacebookMessage {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::parse_facebook;
    use crate::types::{Channel, TEXT_ONLY_NOTICE};
    use serde_json::json;

    #[test]
    fn text_message_carries_page_and_timestamp() {
        let body = json!({
            "object": "page",
            "entry": [{
                "id": "page-77",
                "messaging": [{
                    "sender": { "id": "psid-9" },
                    "timestamp": 1_700_000_000_000_i64,
                    "message": { "mid": "m1", "text": "Ship to Da Nang?" }
                }]
            }]
        });
        let event = parse_facebook(&body).expect("parse payload");
        assert_eq!(event.channel, Channel::Facebook);
        assert_eq!(event.external_sender_id, "psid-9");
        assert_eq!(event.page_id.as_deref(), Some("page-77"));
        assert_eq!(event.text, "Ship to Da Nang?");
        assert!(event.timestamp.is_some());
    }

    #[test]
    fn attachment_only_message_substitutes_notice() {
        let body = json!({
            "entry": [{
                "id": "page-77",
                "messaging": [{
                    "sender": { "id": "psid-9" },
                    "message": { "attachments": [{ "type": "image" }] }
                }]
            }]
        });
        let event = parse_facebook(&body).expect("parse payload");
        assert_eq!(event.text, TEXT_ONLY_NOTICE);
    }

    #[test]
    fn empty_entry_list_is_rejected() {
        assert!(parse_facebook(&json!({ "entry": [] })).is_err());
    }
}
