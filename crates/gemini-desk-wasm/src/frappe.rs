use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder};
use serde_json::{json, Value};
use web_sys::{File, FormData};

use gemini_desk_session::{ChatBackend, ChatRequest, WorkspaceBackend};
use gemini_desk_types::{
    ChatConfig, ChatError, ChatReply, Conversation, ConversationId, ConversationSummary,
    FileReference, FrappeEnvelope, Message, SearchQuery, SearchResults,
};

use crate::host::{csrf_token, js_error};

/// Client for the `gemini_integration.api` whitelisted methods
#[derive(Clone)]
pub struct FrappeClient {
    config: ChatConfig,
}

impl FrappeClient {
    pub fn new(config: ChatConfig) -> Self {
        Self { config }
    }

    fn post(&self, method: &str) -> RequestBuilder {
        let path = format!("/api/method/{}", self.config.method(method));
        log::debug!("POST {}", path);
        let builder = Request::post(&path).header("Accept", "application/json");
        match csrf_token() {
            Some(token) => builder.header("X-Frappe-CSRF-Token", &token),
            None => builder,
        }
    }

    async fn call(&self, method: &str, args: &Value) -> Result<Value, ChatError> {
        let response = self
            .post(method)
            .json(args)
            .map_err(|e| ChatError::transport(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::transport(format!("Failed to read response: {}", e)))?;
        if !response.ok() {
            log::warn!("{} returned HTTP {}", method, status);
        }
        FrappeEnvelope::parse(&body, status)
    }

    /// Multipart upload of a file to attach to the next `chat` call
    pub async fn upload_file(&self, file: &File) -> Result<FileReference, ChatError> {
        let name = file.name();
        let form = FormData::new().map_err(js_error)?;
        form.append_with_blob_and_filename("file", file, &name)
            .map_err(js_error)?;
        form.append_with_str("is_private", "1").map_err(js_error)?;

        let response = self
            .post("upload_file")
            .body(form)
            .map_err(|e| ChatError::transport(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("Upload failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::transport(format!("Failed to read response: {}", e)))?;
        let value = FrappeEnvelope::parse(&body, status)?;
        log::info!("Uploaded {}", name);
        FileReference::from_upload(&name, value)
    }
}

#[async_trait(?Send)]
impl ChatBackend for FrappeClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let value = self.call("chat", &request.chat_args()).await?;
        Ok(ChatReply::from_value(value))
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<(), ChatError> {
        self.call("stream_chat", &request.stream_args()).await?;
        Ok(())
    }

    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, ChatError> {
        match self.call("get_conversations", &json!({})).await? {
            Value::Null => Ok(Vec::new()),
            value => Ok(serde_json::from_value(value)?),
        }
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ChatError> {
        let value = self
            .call(
                "get_conversation",
                &json!({ "conversation_id": conversation_id }),
            )
            .await?;
        Conversation::from_record(value)
    }

    async fn save_conversation(
        &self,
        conversation_id: Option<&str>,
        title: &str,
        messages: &[Message],
    ) -> Result<ConversationId, ChatError> {
        let mut args = json!({
            "title": title,
            "conversation": serde_json::to_string(messages)?,
        });
        if let Some(id) = conversation_id {
            args["conversation_id"] = Value::String(id.to_string());
        }

        match self.call("save_conversation", &args).await? {
            Value::String(name) if !name.is_empty() => Ok(name),
            Value::Object(record) => match record.get("name").and_then(Value::as_str) {
                Some(name) => Ok(name.to_string()),
                None => Err(ChatError::protocol("saved conversation has no name")),
            },
            other => Err(ChatError::protocol(format!(
                "unexpected save_conversation result: {}",
                other
            ))),
        }
    }
}

#[async_trait(?Send)]
impl WorkspaceBackend for FrappeClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, ChatError> {
        let value = self.call("search", &query.to_args()).await?;
        SearchResults::from_value(value)
    }

    async fn check_google_integration(&self) -> Result<bool, ChatError> {
        match self.call("check_google_integration", &json!({})).await? {
            Value::Bool(connected) => Ok(connected),
            Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
            Value::Null => Ok(false),
            other => Err(ChatError::protocol(format!(
                "unexpected check_google_integration result: {}",
                other
            ))),
        }
    }

    async fn get_auth_url(&self) -> Result<String, ChatError> {
        match self.call("get_auth_url", &json!({})).await? {
            Value::String(url) => Ok(url),
            other => Err(ChatError::protocol(format!(
                "unexpected get_auth_url result: {}",
                other
            ))),
        }
    }
}
