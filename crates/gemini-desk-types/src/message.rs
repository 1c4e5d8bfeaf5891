use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;

/// Conversation ID type (the backend document name)
pub type ConversationId = String;

// ============================================================================
// Messages
// ============================================================================

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    /// Stored as `gemini` by the backend
    #[serde(rename = "gemini", alias = "assistant", alias = "model")]
    Assistant,
    #[serde(rename = "thought")]
    Thought,
}

impl Role {
    /// Lenient parse used for stored records, which predate the role enum
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "gemini" | "assistant" | "model" => Some(Role::Assistant),
            "thought" | "thoughts" => Some(Role::Thought),
            _ => None,
        }
    }

    /// CSS modifier for transcript bubbles
    pub fn css_class(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Thought => "thought",
        }
    }

    /// Thoughts are shown but never saved
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Role::Thought)
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image_url: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn thought(text: impl Into<String>) -> Self {
        Self::new(Role::Thought, text)
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|url| !url.trim().is_empty());
        self
    }
}

/// Shape of a stored entry before role validation
#[derive(Debug, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    role: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

/// Decode a stored message array, skipping entries with unknown roles
pub fn decode_message_log(value: &Value) -> Result<Vec<Message>, ChatError> {
    let entries: Vec<StoredEntry> = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => return Ok(Vec::new()),
        Value::String(s) => serde_json::from_str(s)?,
        Value::Array(_) => serde_json::from_value(value.clone())?,
        other => {
            return Err(ChatError::protocol(format!(
                "conversation log is neither a list nor a JSON string: {}",
                other
            )))
        }
    };

    let mut messages = Vec::with_capacity(entries.len());
    for entry in entries {
        match Role::parse(&entry.role) {
            Some(role) => {
                let text = entry.text.or(entry.content).unwrap_or_default();
                messages.push(Message::new(role, text).with_image(entry.image_url));
            }
            None => log::warn!("Skipping stored entry with unknown role: {:?}", entry.role),
        }
    }
    Ok(messages)
}

// ============================================================================
// Conversations
// ============================================================================

/// A titled sequence of turns, unsaved while `id` is `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    pub id: Option<ConversationId>,
    pub title: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ConversationRecord {
    name: ConversationId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    conversation: Value,
}

impl Conversation {
    /// Decode a `get_conversation` document
    pub fn from_record(value: Value) -> Result<Self, ChatError> {
        let record: ConversationRecord = serde_json::from_value(value)?;
        let messages = decode_message_log(&record.conversation)?;
        Ok(Self {
            id: Some(record.name),
            title: record.title.unwrap_or_default(),
            messages,
        })
    }

    /// Messages that belong in the saved record
    pub fn persisted_messages(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.role.is_persisted())
            .cloned()
            .collect()
    }
}

/// Sidebar entry as returned by `get_conversations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub name: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
}

impl ConversationSummary {
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => "Untitled conversation",
        }
    }
}

// ============================================================================
// Clarifications and attachments
// ============================================================================

/// A candidate referent offered when the backend needs disambiguation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationOption {
    #[serde(alias = "name", alias = "title")]
    pub label: String,
    #[serde(default, alias = "link")]
    pub url: String,
}

/// Uploaded file handed to the next `chat` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub name: String,
    pub uri: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    file_url: Option<String>,
}

impl FileReference {
    /// Decode an `upload_file` reply, preferring the model-side `uri`
    pub fn from_upload(name: &str, value: Value) -> Result<Self, ChatError> {
        let uri = match value {
            Value::String(s) => Some(s),
            other => {
                let response: UploadResponse = serde_json::from_value(other)?;
                response.uri.or(response.file_url)
            }
        };
        match uri.filter(|u| !u.trim().is_empty()) {
            Some(uri) => Ok(Self {
                name: name.to_string(),
                uri,
            }),
            None => Err(ChatError::protocol("upload returned neither uri nor file_url")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_assistant_role_encodes_as_gemini() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json, json!({"role": "gemini", "text": "hi"}));
    }

    #[test]
    fn test_role_accepts_assistant_aliases() {
        let msg: Message = serde_json::from_value(json!({"role": "assistant", "text": "x"})).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        let msg: Message = serde_json::from_value(json!({"role": "model", "text": "x"})).unwrap();
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_record_with_json_string_log() {
        let record = json!({
            "name": "conv-1",
            "title": "Sales",
            "conversation": "[{\"role\": \"user\", \"text\": \"hi\"}, {\"role\": \"gemini\", \"text\": \"hello\", \"image_url\": \"/files/a.png\"}]"
        });
        let conv = Conversation::from_record(record).unwrap();
        assert_eq!(conv.id.as_deref(), Some("conv-1"));
        assert_eq!(
            conv.messages,
            vec![
                Message::user("hi"),
                Message::assistant("hello").with_image(Some("/files/a.png".to_string())),
            ]
        );
    }

    #[test]
    fn test_record_with_missing_log_is_empty() {
        let conv = Conversation::from_record(json!({"name": "conv-2", "conversation": null})).unwrap();
        assert!(conv.messages.is_empty());
        assert_eq!(conv.title, "");
    }

    #[test]
    fn test_unknown_roles_are_skipped() {
        let log = json!([{"role": "tool", "text": "x"}, {"role": "user", "text": "y"}]);
        let messages = decode_message_log(&log).unwrap();
        assert_eq!(messages, vec![Message::user("y")]);
    }

    #[test]
    fn test_persisted_messages_drop_thoughts() {
        let conv = Conversation {
            id: None,
            title: String::new(),
            messages: vec![
                Message::user("q"),
                Message::thought("thinking"),
                Message::assistant("a"),
            ],
        };
        assert_eq!(
            conv.persisted_messages(),
            vec![Message::user("q"), Message::assistant("a")]
        );
    }

    #[test]
    fn test_upload_prefers_uri() {
        let file = FileReference::from_upload(
            "a.pdf",
            json!({"uri": "files/abc", "file_url": "/files/a.pdf"}),
        )
        .unwrap();
        assert_eq!(file.uri, "files/abc");

        let file = FileReference::from_upload("a.pdf", json!({"file_url": "/files/a.pdf"})).unwrap();
        assert_eq!(file.uri, "/files/a.pdf");
    }

    #[test]
    fn test_upload_without_reference_fails() {
        assert!(FileReference::from_upload("a.pdf", json!({})).is_err());
    }

    #[test]
    fn test_summary_fallback_title() {
        let summary = ConversationSummary {
            name: "x".to_string(),
            title: Some("   ".to_string()),
        };
        assert_eq!(summary.display_title(), "Untitled conversation");
    }
}
