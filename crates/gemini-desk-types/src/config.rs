use serde::{Deserialize, Serialize};

use crate::{DEFAULT_API_PREFIX, DEFAULT_MODEL_PREFERENCE_KEY, DEFAULT_STREAM_EVENT};

/// Desk document the user is looking at, forwarded to `stream_chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub doctype: String,
    pub docname: String,
}

/// Widget configuration handed over by the desk page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_true")]
    pub streaming: bool,
    /// Server-side "enable Google Search" setting
    #[serde(default)]
    pub google_search_enabled: bool,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_stream_event")]
    pub stream_event: String,
    #[serde(default = "default_preference_key")]
    pub model_preference_key: String,
    #[serde(default)]
    pub page_context: Option<PageContext>,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_models() -> Vec<String> {
    vec!["gemini-2.5-flash".to_string(), "gemini-2.5-pro".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_greeting() -> String {
    "Hello! How can I help you today?".to_string()
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

fn default_stream_event() -> String {
    DEFAULT_STREAM_EVENT.to_string()
}

fn default_preference_key() -> String {
    DEFAULT_MODEL_PREFERENCE_KEY.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            models: default_models(),
            streaming: true,
            google_search_enabled: false,
            greeting: default_greeting(),
            api_prefix: default_api_prefix(),
            stream_event: default_stream_event(),
            model_preference_key: default_preference_key(),
            page_context: None,
        }
    }
}

impl ChatConfig {
    /// Parse the page-supplied JSON, falling back to defaults when it is
    /// blank or malformed
    pub fn from_json(json: &str) -> Self {
        if json.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str(json) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Invalid chat config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Fully qualified method path, e.g. `gemini_integration.api.chat`
    pub fn method(&self, name: &str) -> String {
        format!("{}.{}", self.api_prefix.trim_end_matches('.'), name)
    }

    pub fn is_known_model(&self, model: &str) -> bool {
        model == self.default_model || self.models.iter().any(|m| m == model)
    }
}
