//! Reply shapes decoded once at the RPC boundary.
//!
//! The backend answers `chat` with either a bare string (older endpoints) or
//! an object whose fields decide how the turn renders. Streaming output
//! arrives separately on the realtime channel as small JSON payloads.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ChatError;
use crate::message::{ClarificationOption, ConversationId};

// ============================================================================
// Unary replies
// ============================================================================

/// Options the user must pick from before the backend can proceed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clarification {
    pub intro: String,
    pub options: Vec<ClarificationOption>,
}

/// Decoded `chat` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// Bare informational string
    Legacy(String),
    /// Normal assistant turn
    Answer {
        thoughts: Option<String>,
        text: String,
        image_url: Option<String>,
        conversation_id: Option<ConversationId>,
    },
    /// Turn that needs the user to disambiguate
    Clarify {
        thoughts: Option<String>,
        clarification: Clarification,
        conversation_id: Option<ConversationId>,
    },
    /// Nothing displayable came back
    Empty {
        conversation_id: Option<ConversationId>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RawReply {
    #[serde(default)]
    thoughts: Value,
    #[serde(default)]
    response: Option<String>,
    #[serde(default, alias = "options")]
    suggestions: Option<Vec<ClarificationOption>>,
    #[serde(default)]
    conversation_id: Option<ConversationId>,
    #[serde(default)]
    image_url: Option<String>,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Thoughts come as a string or a list of strings depending on the backend
fn thoughts_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(Some(s)),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => non_blank(Some(s)),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n\n"))
            }
        }
        _ => None,
    }
}

impl ChatReply {
    /// Decode a `chat` response. Malformed shapes collapse to `Empty`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => ChatReply::Empty {
                conversation_id: None,
            },
            Value::String(s) => {
                if s.trim().is_empty() {
                    ChatReply::Empty {
                        conversation_id: None,
                    }
                } else {
                    ChatReply::Legacy(s)
                }
            }
            Value::Object(_) => match serde_json::from_value::<RawReply>(value) {
                Ok(raw) => Self::from_raw(raw),
                Err(e) => {
                    log::warn!("Malformed chat reply: {}", e);
                    ChatReply::Empty {
                        conversation_id: None,
                    }
                }
            },
            other => {
                log::warn!("Unexpected chat reply shape: {}", other);
                ChatReply::Empty {
                    conversation_id: None,
                }
            }
        }
    }

    fn from_raw(raw: RawReply) -> Self {
        let thoughts = thoughts_text(raw.thoughts);
        let conversation_id = non_blank(raw.conversation_id);
        let text = raw.response.unwrap_or_default();
        let options = raw.suggestions.unwrap_or_default();

        if !options.is_empty() {
            return ChatReply::Clarify {
                thoughts,
                clarification: Clarification {
                    intro: text,
                    options,
                },
                conversation_id,
            };
        }

        let image_url = non_blank(raw.image_url);
        if text.trim().is_empty() && image_url.is_none() {
            return ChatReply::Empty { conversation_id };
        }

        ChatReply::Answer {
            thoughts,
            text,
            image_url,
            conversation_id,
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            ChatReply::Legacy(_) => None,
            ChatReply::Answer {
                conversation_id, ..
            }
            | ChatReply::Clarify {
                conversation_id, ..
            }
            | ChatReply::Empty { conversation_id } => conversation_id.as_deref(),
        }
    }
}

// ============================================================================
// Streaming events
// ============================================================================

/// One step of a streamed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Backend created the conversation record for this turn
    ConversationAssigned(ConversationId),
    Chunk(String),
    Failed(String),
    Ended {
        conversation_id: Option<ConversationId>,
    },
}

/// Events decoded from one realtime payload, with the optional sequence
/// number used to restore emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUpdate {
    pub seq: Option<u64>,
    pub events: Vec<StreamEvent>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStreamPayload {
    #[serde(default)]
    conversation_id: Option<ConversationId>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    end_of_stream: bool,
    #[serde(default)]
    seq: Option<u64>,
}

impl StreamUpdate {
    /// Decode a `gemini_chat_update` payload
    pub fn from_value(value: Value) -> Result<Self, ChatError> {
        let raw: RawStreamPayload = serde_json::from_value(value)?;
        let conversation_id = non_blank(raw.conversation_id);
        let mut events = Vec::new();

        if !raw.end_of_stream {
            if let Some(id) = conversation_id.clone() {
                events.push(StreamEvent::ConversationAssigned(id));
            }
        }
        if let Some(delta) = raw.message {
            if !delta.is_empty() {
                events.push(StreamEvent::Chunk(delta));
            }
        }
        if let Some(error) = raw.error {
            events.push(StreamEvent::Failed(error));
        }
        if raw.end_of_stream {
            events.push(StreamEvent::Ended { conversation_id });
        }

        Ok(Self {
            seq: raw.seq,
            events,
        })
    }
}
