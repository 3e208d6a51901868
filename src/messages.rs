//! Canonical message record shared by the normalizer, windower and exporters.
//!
//! Every consumer (preview endpoint, formatters) reads the same seven fields.
//! Records are built once per normalization and never mutated afterwards, so
//! blocks hold plain shared references into the normalized sequence.

use serde::Serialize;
use std::fmt;

/// Placeholder text for messages that carry media but no text
pub const MEDIA_PLACEHOLDER: &str = "(media)";

/// Placeholder sender name when neither a name nor an id is known
pub const UNKNOWN_SENDER: &str = "unknown";

/// Author identifier as found in the export: numeric or textual
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SenderId {
    Int(i64),
    Text(String),
}

impl SenderId {
    pub fn is_empty(&self) -> bool {
        matches!(self, SenderId::Text(s) if s.is_empty())
    }
}

impl Default for SenderId {
    fn default() -> Self {
        SenderId::Text(String::new())
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderId::Int(n) => write!(f, "{}", n),
            SenderId::Text(s) => f.write_str(s),
        }
    }
}

/// A normalized chat message from any supported export shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub message_id: i64,
    /// `YYYY-MM-DD HH:MM:SS` for numeric epochs, otherwise the raw value
    pub timestamp: String,
    pub sender_id: SenderId,
    pub sender_name: String,
    pub text_content: String,
    pub reply_to_id: Option<i64>,
    pub reactions_count: u64,
}

impl ChatMessage {
    /// Build a record, filling the text and sender-name fallbacks.
    pub fn new(
        message_id: i64,
        text_content: String,
        timestamp: String,
        sender_id: SenderId,
        sender_name: String,
        reply_to_id: Option<i64>,
        reactions_count: u64,
    ) -> Self {
        let text_content = if text_content.is_empty() {
            MEDIA_PLACEHOLDER.to_string()
        } else {
            text_content
        };

        let sender_name = if !sender_name.is_empty() {
            sender_name
        } else if !sender_id.is_empty() {
            sender_id.to_string()
        } else {
            UNKNOWN_SENDER.to_string()
        };

        Self {
            message_id,
            timestamp,
            sender_id,
            sender_name,
            text_content,
            reply_to_id,
            reactions_count,
        }
    }

    /// Whitespace-delimited token count of the text
    pub fn word_count(&self) -> usize {
        self.text_content.split_whitespace().count()
    }
}

/// One export unit: an ordered run of records, possibly sharing a prefix
/// with the following block.
pub type Block<'a> = Vec<&'a ChatMessage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_name_fallbacks() {
        let named = ChatMessage::new(1, "hi".into(), String::new(), SenderId::Int(7), "Ann".into(), None, 0);
        assert_eq!(named.sender_name, "Ann");

        let by_id = ChatMessage::new(1, "hi".into(), String::new(), SenderId::Int(7), String::new(), None, 0);
        assert_eq!(by_id.sender_name, "7");

        let unknown = ChatMessage::new(1, "hi".into(), String::new(), SenderId::default(), String::new(), None, 0);
        assert_eq!(unknown.sender_name, UNKNOWN_SENDER);
    }

    #[test]
    fn test_empty_text_gets_media_placeholder() {
        let msg = ChatMessage::new(1, String::new(), String::new(), SenderId::default(), String::new(), None, 0);
        assert_eq!(msg.text_content, MEDIA_PLACEHOLDER);
        assert_eq!(msg.word_count(), 1);
    }

    #[test]
    fn test_serialized_field_order_and_sender_shape() {
        let msg = ChatMessage::new(3, "a b".into(), "2024-01-01 00:00:00".into(), SenderId::Text("user9".into()), "Bo".into(), Some(2), 4);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"message_id":3,"timestamp":"2024-01-01 00:00:00","sender_id":"user9","sender_name":"Bo","text_content":"a b","reply_to_id":2,"reactions_count":4}"#
        );

        let numeric = ChatMessage::new(3, "x".into(), String::new(), SenderId::Int(42), String::new(), None, 0);
        let value = serde_json::to_value(&numeric).unwrap();
        assert_eq!(value["sender_id"], 42);
        assert!(value["reply_to_id"].is_null());
    }
}
