use async_trait::async_trait;
use serde_json::{json, Map, Value};

use gemini_desk_types::{
    ChatError, ChatReply, Conversation, ConversationId, ConversationSummary, Message, PageContext,
    SearchQuery, SearchResults,
};

/// Arguments of one chat turn, shared by `chat` and `stream_chat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub prompt: String,
    pub model: String,
    pub conversation_id: Option<ConversationId>,
    pub use_google_search: bool,
    pub file_uri: Option<String>,
    pub context: Option<PageContext>,
}

impl ChatRequest {
    fn base_args(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("prompt".to_string(), Value::String(self.prompt.clone()));
        args.insert("model".to_string(), Value::String(self.model.clone()));
        if let Some(id) = &self.conversation_id {
            args.insert("conversation_id".to_string(), Value::String(id.clone()));
        }
        if self.use_google_search {
            args.insert("use_google_search".to_string(), Value::Bool(true));
        }
        args
    }

    /// Keyword arguments for `chat`
    pub fn chat_args(&self) -> Value {
        let mut args = self.base_args();
        if let Some(uri) = &self.file_uri {
            args.insert("file_uri".to_string(), Value::String(uri.clone()));
        }
        Value::Object(args)
    }

    /// Keyword arguments for `stream_chat`
    pub fn stream_args(&self) -> Value {
        let mut args = self.base_args();
        if let Some(context) = &self.context {
            args.insert(
                "context".to_string(),
                json!({"doctype": context.doctype, "docname": context.docname}),
            );
        }
        Value::Object(args)
    }
}

/// Conversation endpoints of the backend app.
///
/// Futures are not `Send`: the browser runs everything on one thread.
#[async_trait(?Send)]
pub trait ChatBackend {
    /// Unary turn
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ChatError>;

    /// Starts a streamed turn; output arrives on the realtime channel
    async fn stream_chat(&self, request: &ChatRequest) -> Result<(), ChatError>;

    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, ChatError>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ChatError>;

    /// Creates a record when `conversation_id` is `None`, otherwise updates it
    async fn save_conversation(
        &self,
        conversation_id: Option<&str>,
        title: &str,
        messages: &[Message],
    ) -> Result<ConversationId, ChatError>;
}

/// Search and Google account endpoints
#[async_trait(?Send)]
pub trait WorkspaceBackend {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, ChatError>;

    async fn check_google_integration(&self) -> Result<bool, ChatError>;

    async fn get_auth_url(&self) -> Result<String, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            prompt: "hi".to_string(),
            model: "gemini-2.5-pro".to_string(),
            conversation_id: None,
            use_google_search: false,
            file_uri: Some("files/abc".to_string()),
            context: Some(PageContext {
                doctype: "Customer".to_string(),
                docname: "CUST-0001".to_string(),
            }),
        }
    }

    #[test]
    fn test_chat_args_carry_file_not_context() {
        assert_eq!(
            request().chat_args(),
            json!({"prompt": "hi", "model": "gemini-2.5-pro", "file_uri": "files/abc"})
        );
    }

    #[test]
    fn test_stream_args_carry_context_not_file() {
        let mut req = request();
        req.conversation_id = Some("conv-1".to_string());
        req.use_google_search = true;
        assert_eq!(
            req.stream_args(),
            json!({
                "prompt": "hi",
                "model": "gemini-2.5-pro",
                "conversation_id": "conv-1",
                "use_google_search": true,
                "context": {"doctype": "Customer", "docname": "CUST-0001"}
            })
        );
    }
}
