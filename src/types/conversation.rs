//! Conversation record
//!
//! The store only relies on `id`. Everything else is kept as an opaque JSON
//! payload and written back verbatim.

use crate::types::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload field holding the message list
const MESSAGES_FIELD: &str = "messages";

/// A stored conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Caller-assigned identifier, unique within a scope
    pub id: String,
    /// Remaining fields, uninterpreted
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Conversation {
    /// Create a conversation with an empty payload
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Map::new(),
        }
    }

    /// Set a payload field. `id` is reserved and ignored here.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key == "id" {
            tracing::warn!("Ignoring payload field named 'id' on conversation {}", self.id);
            return self;
        }
        self.payload.insert(key, value.into());
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.payload.get("title").and_then(Value::as_str)
    }

    /// Messages that parse as [`Message`]; malformed entries are skipped
    pub fn messages(&self) -> Vec<Message> {
        self.raw_messages()
            .filter_map(|value| serde_json::from_value(value.clone()).ok())
            .collect()
    }

    /// The `content` string of every message entry
    pub fn message_contents(&self) -> impl Iterator<Item = &str> {
        self.raw_messages()
            .filter_map(|value| value.get("content").and_then(Value::as_str))
    }

    /// Append a message, creating the `messages` field if needed
    pub fn push_message(&mut self, message: Message) {
        let value = match serde_json::to_value(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                return;
            }
        };

        let entry = self
            .payload
            .entry(MESSAGES_FIELD)
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(messages) => messages.push(value),
            other => *other = Value::Array(vec![value]),
        }
    }

    fn raw_messages(&self) -> impl Iterator<Item = &Value> {
        self.payload
            .get(MESSAGES_FIELD)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::Role;
    use serde_json::json;

    #[test]
    fn test_payload_round_trip() {
        let json = json!({
            "id": "c1",
            "title": "Quarterly report",
            "updatedAt": "2024-05-01T10:00:00.000Z",
            "messagesLoaded": true,
            "messages": [{"role": "user", "content": "hi"}]
        });

        let conversation: Conversation = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(conversation.id, "c1");
        assert_eq!(conversation.title(), Some("Quarterly report"));
        assert!(!conversation.payload.contains_key("id"));

        assert_eq!(serde_json::to_value(&conversation).unwrap(), json);
    }

    #[test]
    fn test_payload_keeps_field_order() {
        let text = r#"{"zeta":1,"id":"a","alpha":2}"#;
        let conversation: Conversation = serde_json::from_str(text).unwrap();

        let keys: Vec<&str> = conversation.payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(
            serde_json::to_string(&conversation).unwrap(),
            r#"{"id":"a","zeta":1,"alpha":2}"#
        );
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert!(serde_json::from_value::<Conversation>(json!({"title": "x"})).is_err());
        assert!(serde_json::from_value::<Conversation>(json!({"id": 7})).is_err());
    }

    #[test]
    fn test_with_field_ignores_id() {
        let conversation = Conversation::new("a")
            .with_field("id", "b")
            .with_field("title", "Hello");
        assert_eq!(conversation.id, "a");
        assert_eq!(conversation.payload.len(), 1);
    }

    #[test]
    fn test_messages_helpers() {
        let mut conversation = Conversation::new("c1").with_field(
            "messages",
            json!([{"role": "user", "content": "first"}, {"content": 3}, "junk"]),
        );
        conversation.push_message(Message::new(Role::Assistant, "second"));

        let contents: Vec<&str> = conversation.message_contents().collect();
        assert_eq!(contents, vec!["first", "second"]);

        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_push_message_replaces_non_array() {
        let mut conversation = Conversation::new("c1").with_field("messages", "oops");
        conversation.push_message(Message::new(Role::User, "hi"));
        assert_eq!(conversation.messages().len(), 1);
    }
}
