//! Core types for gemini-desk
//!
//! This crate holds the data model shared by the session state machine and
//! the browser glue, plus the decoders that turn raw backend payloads into
//! typed values at the RPC boundary.

pub mod config;
pub mod error;
pub mod frappe;
pub mod message;
pub mod reply;
pub mod search;

pub use config::{ChatConfig, PageContext};
pub use error::ChatError;
pub use frappe::FrappeEnvelope;
pub use message::{
    decode_message_log, ClarificationOption, Conversation, ConversationId, ConversationSummary,
    FileReference, Message, Role,
};
pub use reply::{ChatReply, Clarification, StreamEvent, StreamUpdate};
pub use search::{SearchHit, SearchQuery, SearchResults, SearchSource};

// ============================================================================
// Constants
// ============================================================================

/// Whitelisted method namespace of the backend app
pub const DEFAULT_API_PREFIX: &str = "gemini_integration.api";

/// Realtime event carrying streamed chat output
pub const DEFAULT_STREAM_EVENT: &str = "gemini_chat_update";

/// Local storage key for the last selected model
pub const DEFAULT_MODEL_PREFERENCE_KEY: &str = "gemini_chat_model";

/// Backend column limit for conversation titles
pub const MAX_TITLE_CHARS: usize = 140;

/// Truncate a conversation title to the backend column limit
pub fn truncate_title(title: &str) -> String {
    title.trim().chars().take(MAX_TITLE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_title_counts_chars_not_bytes() {
        let long = "é".repeat(200);
        let truncated = truncate_title(&long);
        assert_eq!(truncated.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_truncate_title_trims_whitespace() {
        assert_eq!(truncate_title("  hello \n"), "hello");
    }
}
