//! Chat export normalizer - turns one parsed export document into canonical records.
//!
//! Accepted shapes:
//! - `{"chats": {"list": [chat, ...]}}` or `{"chats": [chat, ...]}` (full account export)
//! - `{"name": ..., "messages": [...]}` (single chat export)
//! - `{"name": ..., "messages_list": [...]}` (alternate single chat layout)
//!
//! A chat holds its raw messages under `messages`, `messages_list`, or a lone
//! `message` object. Every per-message field is looked up through an ordered
//! key chain where the first truthy value wins; anything malformed degrades to
//! a default instead of failing the document.

use crate::error::{AppError, Result};
use crate::messages::{ChatMessage, SenderId};
use chrono::{Datelike, Local, TimeZone};
use serde_json::{Map, Number, Value};
use tracing::debug;

type Object = Map<String, Value>;

/// Key chains per field, in precedence order
const ID_KEYS: &[&str] = &["id", "message_id"];
const DATE_KEYS: &[&str] = &["date", "timestamp"];
const SENDER_ID_KEYS: &[&str] = &["from_id", "from", "sender_id"];
const SENDER_REF_KEYS: &[&str] = &["user_id", "id"];
const SENDER_NAME_KEYS: &[&str] = &["from_name", "sender", "forward_sender_name"];
const REPLY_KEYS: &[&str] = &["reply_to_message_id", "reply_to", "reply_to_id"];
const REPLY_REF_KEYS: &[&str] = &["message_id", "id"];
const REACTION_KEYS: &[&str] = &["reactions", "reactions_count"];
const MESSAGE_LIST_KEYS: &[&str] = &["messages", "messages_list"];
const CHAT_NAME_KEYS: &[&str] = &["name", "title"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Top-level layout of an export document
enum DocumentShape<'a> {
    /// Multi-chat archive: a list of chat objects
    Archive(&'a [Value]),
    /// Single chat with messages directly under `messages`
    Messages { name: String, messages: &'a Value },
    /// The document itself is a chat object
    Chat(&'a Object),
    Unrecognized,
}

/// Decode an uploaded body into a JSON object document.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn parse_document(bytes: &[u8]) -> Result<Value> {
    let text = String::from_utf8_lossy(bytes);
    let document: Value = serde_json::from_str(&text)?;
    if !document.is_object() {
        return Err(AppError::NotAnObject);
    }
    Ok(document)
}

/// Normalize a document into records sorted by `(timestamp, message_id)`.
///
/// Timestamps compare as strings. Unrecognized shapes yield no records.
pub fn normalize(document: &Value) -> Vec<ChatMessage> {
    let doc = match document.as_object() {
        Some(doc) => doc,
        None => return Vec::new(),
    };

    let mut messages = Vec::new();
    let mut dropped = 0usize;
    let mut chat_count = 0usize;

    let mut ingest = |entries: Vec<&Object>| {
        chat_count += 1;
        for raw in entries {
            match parse_message(raw) {
                Some(msg) => messages.push(msg),
                None => dropped += 1,
            }
        }
    };

    match detect_shape(doc) {
        DocumentShape::Archive(chats) => {
            for chat in chats.iter().filter_map(Value::as_object) {
                debug!("Reading chat {:?}", chat_name(chat));
                ingest(chat_entries(chat));
            }
        }
        DocumentShape::Messages { name, messages: list } => {
            debug!("Reading single chat {:?}", name);
            ingest(object_entries(list));
        }
        DocumentShape::Chat(chat) => {
            debug!("Reading chat {:?}", chat_name(chat));
            ingest(chat_entries(chat));
        }
        DocumentShape::Unrecognized => {
            debug!("Unrecognized export shape, no chats found");
            return Vec::new();
        }
    }

    // Stable: ties keep encounter order
    messages.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.message_id.cmp(&b.message_id))
    });

    debug!(
        "Normalized {} messages from {} chats ({} dropped)",
        messages.len(),
        chat_count,
        dropped
    );
    messages
}

fn detect_shape(doc: &Object) -> DocumentShape<'_> {
    if let Some(chats) = doc.get("chats") {
        return match chats {
            Value::Object(container) => match container.get("list") {
                Some(Value::Array(list)) => DocumentShape::Archive(list),
                _ => DocumentShape::Unrecognized,
            },
            Value::Array(list) => DocumentShape::Archive(list),
            _ => DocumentShape::Unrecognized,
        };
    }

    if let Some(messages) = doc.get("messages") {
        let name = doc
            .get("name")
            .map(display_string)
            .unwrap_or_else(|| "Chat".to_string());
        return DocumentShape::Messages { name, messages };
    }

    if doc.contains_key("name") && doc.contains_key("messages_list") {
        return DocumentShape::Chat(doc);
    }

    DocumentShape::Unrecognized
}

fn chat_name(chat: &Object) -> String {
    lookup(chat, CHAT_NAME_KEYS)
        .filter(|v| is_truthy(v))
        .map(display_string)
        .unwrap_or_default()
}

/// Raw message objects of one chat
fn chat_entries(chat: &Object) -> Vec<&Object> {
    let messages = lookup(chat, MESSAGE_LIST_KEYS).filter(|v| is_truthy(v));
    if messages.is_none() && !chat.contains_key("messages") {
        if let Some(single) = chat.get("message") {
            return object_entries_of(std::slice::from_ref(single));
        }
    }
    messages.map(object_entries).unwrap_or_default()
}

fn object_entries(list: &Value) -> Vec<&Object> {
    match list {
        Value::Array(items) => object_entries_of(items),
        _ => Vec::new(),
    }
}

/// Non-object entries are skipped
fn object_entries_of(items: &[Value]) -> Vec<&Object> {
    items.iter().filter_map(Value::as_object).collect()
}

/// Build a canonical record, or `None` for text-less entries without a photo
fn parse_message(raw: &Object) -> Option<ChatMessage> {
    let text = extract_text(raw.get("text"));
    if text.is_empty() && !raw.get("photo").is_some_and(is_truthy) {
        return None;
    }

    let sender_id = extract_sender_id(raw);
    Some(ChatMessage::new(
        extract_message_id(raw),
        text,
        extract_timestamp(raw),
        sender_id,
        extract_sender_name(raw),
        extract_reply_to(raw),
        extract_reactions(raw),
    ))
}

/// Plain string, or concatenated rich-text spans
fn extract_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(spans)) => spans
            .iter()
            .map(|span| match span {
                Value::Object(entity) => entity.get("text").map(display_string).unwrap_or_default(),
                other => display_string(other),
            })
            .collect(),
        _ => String::new(),
    }
}

fn extract_message_id(raw: &Object) -> i64 {
    let value = match lookup(raw, ID_KEYS) {
        Some(Value::Object(inner)) => inner.get("id"),
        other => other,
    };
    value
        .filter(|v| is_truthy(v))
        .and_then(coerce_int)
        .unwrap_or(0)
}

/// Numbers (zero included) and booleans are epochs; other falsy values are empty
fn extract_timestamp(raw: &Object) -> String {
    match lookup(raw, DATE_KEYS) {
        Some(Value::Number(epoch)) => format_epoch(epoch).unwrap_or_else(|| epoch.to_string()),
        Some(Value::Bool(flag)) => format_secs(i64::from(*flag)).unwrap_or_default(),
        Some(other) if is_truthy(other) => display_string(other),
        _ => String::new(),
    }
}

/// Format Unix seconds in local time; `None` when out of range
fn format_epoch(epoch: &Number) -> Option<String> {
    let secs = match epoch.as_i64() {
        Some(secs) => secs,
        None => {
            let secs = epoch.as_f64()?.floor();
            if !secs.is_finite() || secs < i64::MIN as f64 || secs > i64::MAX as f64 {
                return None;
            }
            secs as i64
        }
    };
    format_secs(secs)
}

fn format_secs(secs: i64) -> Option<String> {
    let datetime = Local.timestamp_opt(secs, 0).single()?;
    if !(1..=9999).contains(&datetime.year()) {
        return None;
    }
    Some(datetime.format(TIMESTAMP_FORMAT).to_string())
}

fn extract_sender_id(raw: &Object) -> SenderId {
    let value = match lookup(raw, SENDER_ID_KEYS) {
        Some(Value::Object(sender)) => lookup(sender, SENDER_REF_KEYS),
        other => other,
    };
    match value.filter(|v| is_truthy(v)) {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(SenderId::Int)
            .unwrap_or_else(|| SenderId::Text(n.to_string())),
        Some(other) => SenderId::Text(display_string(other)),
        None => SenderId::default(),
    }
}

fn extract_sender_name(raw: &Object) -> String {
    let name = lookup(raw, SENDER_NAME_KEYS)
        .filter(|v| is_truthy(v))
        .map(display_string)
        .unwrap_or_default();
    if !name.is_empty() {
        return name;
    }
    match raw.get("from") {
        Some(Value::String(from)) => from.clone(),
        _ => name,
    }
}

fn extract_reply_to(raw: &Object) -> Option<i64> {
    let value = match lookup(raw, REPLY_KEYS)? {
        Value::Object(reply) => lookup(reply, REPLY_REF_KEYS)?,
        other => other,
    };
    if value.is_null() {
        return None;
    }
    coerce_int(value)
}

fn extract_reactions(raw: &Object) -> u64 {
    match lookup(raw, REACTION_KEYS).filter(|v| is_truthy(v)) {
        Some(Value::Array(reactions)) => reactions
            .iter()
            .map(|reaction| match reaction {
                Value::Object(r) => r.get("count").map_or(1, non_negative),
                _ => 1,
            })
            .sum(),
        Some(other) => non_negative(other),
        None => 0,
    }
}

/// First truthy value along the key chain; when none is truthy, the last
/// key's raw value (possibly falsy or absent).
fn lookup<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| is_truthy(v))
        .or_else(|| keys.last().and_then(|key| obj.get(*key)))
}

/// Null, false, zero, and empty strings/arrays/objects are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Integers, truncated floats, booleans, and base-10 integer strings
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_negative(value: &Value) -> u64 {
    coerce_int(value).map_or(0, |n| n.max(0) as u64)
}

/// Strings verbatim, null as empty, anything else as JSON text
fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
