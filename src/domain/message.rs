use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Hydrated metadata of one top-level message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Opaque base64 ordering token, compared only as raw bytes.
    #[serde(default)]
    pub conversation_index: Option<String>,
    #[serde(default)]
    pub received_date_time: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub received_epoch: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_date_time: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conversation_id: None,
            conversation_index: None,
            received_date_time: None,
            received_epoch: None,
            sent_date_time: None,
            subject: None,
            shortcode: None,
            extra: Map::new(),
        }
    }

    /// Fill `received_epoch` from `received_date_time` when the remote left it out.
    pub fn derive_epoch(&mut self) {
        if self.received_epoch.is_none() {
            self.received_epoch = self
                .received_date_time
                .as_deref()
                .and_then(parse_timestamp)
                .map(|dt| dt.timestamp_millis());
        }
    }

    /// Receive time, falling back to send time, then the epoch fields, then 1970.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.received_date_time
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.sent_date_time.as_deref().and_then(parse_timestamp))
            .or_else(|| self.received_epoch.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Parse an ISO-8601 timestamp; one without an offset is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Messages of one folder sharing a conversation id, latest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    pub conversation_shortcode: String,
    pub messages: Vec<MessageMetadata>,
    /// Shortcode to message id.
    pub message_shortcodes: BTreeMap<String, String>,
    pub message_shortcode_length: usize,
}

impl Conversation {
    pub fn latest(&self) -> Option<&MessageMetadata> {
        self.messages.first()
    }
}

/// The conversation checkpoint of one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderConversations {
    pub folder_id: String,
    pub folder_shortcode: Option<String>,
    /// Shortcode to conversation id.
    pub conversation_shortcodes: BTreeMap<String, String>,
    pub conversation_shortcode_length: usize,
    pub conversations: Vec<Conversation>,
}

impl FolderConversations {
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.messages.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn epoch_is_derived_from_received_time() {
        let mut meta = MessageMetadata::new("m1");
        meta.received_date_time = Some("2023-05-01T12:00:00Z".into());
        meta.derive_epoch();
        assert_eq!(meta.received_epoch, Some(1_682_942_400_000));
    }

    #[test]
    fn timestamp_falls_back_to_sent_then_epoch() {
        let mut meta = MessageMetadata::new("m1");
        assert_eq!(meta.timestamp(), DateTime::<Utc>::UNIX_EPOCH);

        meta.received_epoch = Some(1_000);
        assert_eq!(meta.timestamp().timestamp_millis(), 1_000);

        meta.sent_date_time = Some("2020-01-02T03:04:05".into());
        assert_eq!(meta.timestamp().to_rfc3339(), "2020-01-02T03:04:05+00:00");
    }

    #[test]
    fn graph_field_names_are_camel_case() {
        let meta: MessageMetadata = serde_json::from_value(json!({
            "id": "m1",
            "conversationId": "c1",
            "conversationIndex": "AQI=",
            "receivedDateTime": "2023-05-01T12:00:00Z",
            "subject": "hi",
            "from": {"emailAddress": {"address": "a@example.com"}}
        }))
        .unwrap();
        assert_eq!(meta.conversation_id.as_deref(), Some("c1"));
        assert!(meta.extra.contains_key("from"));
    }
}
