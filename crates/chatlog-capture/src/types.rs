//! Transcript types: the persisted shape the popup and exporter read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatlog_core::Result;
use chatlog_store::{keys, KvStore};

/// Which participant produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Assistant,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A finalized turn. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub text: String,
    /// Local wall-clock time at capture, e.g. `3:04:05 PM`.
    pub time: String,
    /// Hashtags found in user text; always empty for assistant turns.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Message {
    pub fn user(text: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            kind: MessageType::User,
            text: text.into(),
            time: capture_time(),
            tags,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Assistant,
            text: text.into(),
            time: capture_time(),
            tags: Vec::new(),
        }
    }
}

fn capture_time() -> String {
    chrono::Local::now().format("%-I:%M:%S %p").to_string()
}

/// Both views of the session's messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(rename = "questions")]
    pub user_log: Vec<Message>,
    #[serde(rename = "fullConversation")]
    pub full_log: Vec<Message>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.user_log.is_empty() && self.full_log.is_empty()
    }

    /// Read the transcript last mirrored to `store`. Missing keys read as empty.
    pub fn load(store: &dyn KvStore) -> Result<Self> {
        Ok(Self {
            user_log: read_log(store, keys::QUESTIONS)?,
            full_log: read_log(store, keys::FULL_CONVERSATION)?,
        })
    }

    /// Remove both logs from `store`. A running session sees the removals
    /// and drops its in-memory copies.
    pub fn clear(store: &dyn KvStore) -> Result<()> {
        store.remove(&keys::TRANSCRIPT_KEYS)
    }
}

fn read_log(store: &dyn KvStore, key: &str) -> Result<Vec<Message>> {
    match store.get(key)? {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

/// Commands from the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ControlCommand {
    #[serde(rename = "resetData")]
    ResetData,
}

/// Point-in-time view of a capture session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "inputBound")]
    pub input_bound: bool,
    #[serde(rename = "formBound")]
    pub form_bound: bool,
    #[serde(rename = "outputBound")]
    pub output_bound: bool,
    #[serde(rename = "pendingInput")]
    pub pending_input: bool,
    #[serde(rename = "bufferedChars")]
    pub buffered_chars: usize,
    #[serde(rename = "userMessages")]
    pub user_messages: usize,
    #[serde(rename = "totalMessages")]
    pub total_messages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlog_store::MemoryStore;

    #[test]
    fn test_message_wire_shape() {
        let msg = Message::user("note #x", vec!["x".into()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "user");
        assert_eq!(json["text"], "note #x");
        assert_eq!(json["tags"], serde_json::json!(["x"]));
        assert!(json["time"].is_string());
    }

    #[test]
    fn test_load_missing_keys_is_empty() {
        let store = MemoryStore::new();
        assert!(Transcript::load(&store).unwrap().is_empty());
    }

    #[test]
    fn test_load_round_trips_store_shape() {
        let store = MemoryStore::new();
        let answer = Message::assistant("Hello world");
        store
            .set(vec![(
                keys::FULL_CONVERSATION.into(),
                serde_json::to_value(vec![answer.clone()]).unwrap(),
            )])
            .unwrap();

        let transcript = Transcript::load(&store).unwrap();
        assert!(transcript.user_log.is_empty());
        assert_eq!(transcript.full_log, vec![answer]);
    }

    #[test]
    fn test_clear_keeps_settings() {
        let store = MemoryStore::new();
        store
            .set(vec![
                (keys::QUESTIONS.into(), serde_json::json!([])),
                (keys::DARK_MODE.into(), serde_json::json!(true)),
            ])
            .unwrap();

        Transcript::clear(&store).unwrap();
        assert_eq!(store.get(keys::QUESTIONS).unwrap(), None);
        assert_eq!(store.get(keys::DARK_MODE).unwrap(), Some(serde_json::json!(true)));
    }

    #[test]
    fn test_control_command_shape() {
        let cmd: ControlCommand = serde_json::from_str(r#"{"action":"resetData"}"#).unwrap();
        assert_eq!(cmd, ControlCommand::ResetData);
    }
}
