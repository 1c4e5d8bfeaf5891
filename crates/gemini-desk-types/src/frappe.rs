//! Frappe `/api/method` response envelope.
//!
//! Successful calls wrap the return value in `{"message": ...}`. Failures
//! carry `exc_type`, a traceback in `exception`, and `_server_messages`: a
//! JSON-encoded list of JSON-encoded `{"message": ...}` objects.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ChatError;

#[derive(Debug, Default, Deserialize)]
pub struct FrappeEnvelope {
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub exc_type: Option<String>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default, rename = "_server_messages")]
    pub server_messages: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerMessage {
    #[serde(default)]
    message: Option<String>,
}

impl FrappeEnvelope {
    pub fn is_error(&self) -> bool {
        self.exc_type.is_some() || self.exception.is_some()
    }

    /// First user-facing message from `_server_messages`
    pub fn server_message(&self) -> Option<String> {
        let raw = self.server_messages.as_deref()?;
        let encoded: Vec<String> = serde_json::from_str(raw).ok()?;
        encoded.iter().find_map(|entry| {
            serde_json::from_str::<ServerMessage>(entry)
                .ok()
                .and_then(|m| m.message)
                .or_else(|| Some(entry.clone()))
                .filter(|m| !m.trim().is_empty())
        })
    }

    /// Turn the envelope into the call's return value.
    ///
    /// `http_ok` is false for non-2xx statuses; those are errors even when
    /// the body carries no exception fields.
    pub fn into_result(self, http_ok: bool) -> Result<Value, ChatError> {
        if self.is_error() || !http_ok {
            let message = self
                .server_message()
                .or_else(|| self.exception.as_deref().map(last_exception_line))
                .or_else(|| self.exc_type.clone())
                .unwrap_or_else(|| "The server returned an error".to_string());
            return Err(ChatError::Server {
                exc_type: self.exc_type,
                message,
            });
        }
        Ok(self.message.unwrap_or(Value::Null))
    }

    /// Parse a response body received with HTTP `status` and unwrap it.
    ///
    /// Error statuses whose body is not a Frappe envelope (a proxy's 502
    /// page, say) become transport errors naming the status.
    pub fn parse(body: &str, status: u16) -> Result<Value, ChatError> {
        let http_ok = (200..300).contains(&status);
        if body.trim().is_empty() {
            if http_ok {
                return Ok(Value::Null);
            }
            return Err(ChatError::transport(format!(
                "The server responded with HTTP {}",
                status
            )));
        }
        let envelope: FrappeEnvelope = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(_) if !http_ok => {
                return Err(ChatError::transport(format!(
                    "The server responded with HTTP {}",
                    status
                )))
            }
            Err(e) => return Err(e.into()),
        };
        envelope.into_result(http_ok)
    }
}

/// `exception` holds "frappe.exceptions.ValidationError: text"; keep the text
fn last_exception_line(exception: &str) -> String {
    let line = exception.trim().lines().last().unwrap_or_default();
    match line.split_once(": ") {
        Some((_, text)) if !text.trim().is_empty() => text.trim().to_string(),
        _ => line.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_unwraps_message() {
        let value = FrappeEnvelope::parse(r#"{"message": {"response": "hi"}}"#, 200).unwrap();
        assert_eq!(value, json!({"response": "hi"}));
    }

    #[test]
    fn test_success_without_message_is_null() {
        assert_eq!(FrappeEnvelope::parse("{}", 200).unwrap(), Value::Null);
    }

    #[test]
    fn test_server_messages_win() {
        let inner = serde_json::to_string(&json!({"message": "Gemini API Key not found."})).unwrap();
        let outer = serde_json::to_string(&vec![inner]).unwrap();
        let body = serde_json::to_string(&json!({
            "exc_type": "ValidationError",
            "exception": "frappe.exceptions.ValidationError: Gemini API Key not found.",
            "_server_messages": outer,
        }))
        .unwrap();
        let err = FrappeEnvelope::parse(&body, 417).unwrap_err();
        assert_eq!(err.to_string(), "Gemini API Key not found.");
    }

    #[test]
    fn test_exception_line_fallback() {
        let body = r#"{"exc_type": "PermissionError", "exception": "Traceback...\nfrappe.exceptions.PermissionError: Not permitted"}"#;
        let err = FrappeEnvelope::parse(body, 403).unwrap_err();
        assert_eq!(err.to_string(), "Not permitted");
    }

    #[test]
    fn test_http_failure_without_fields() {
        let err = FrappeEnvelope::parse("{}", 500).unwrap_err();
        assert_eq!(err.to_string(), "The server returned an error");
    }

    #[test]
    fn test_non_json_error_page_names_status() {
        let err = FrappeEnvelope::parse("<html><body>502 Bad Gateway</body></html>", 502).unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
        assert_eq!(err.to_string(), "The server responded with HTTP 502");
    }

    #[test]
    fn test_empty_error_body_names_status() {
        let err = FrappeEnvelope::parse("", 504).unwrap_err();
        assert_eq!(err.to_string(), "The server responded with HTTP 504");
    }

    #[test]
    fn test_non_json_success_is_decode_error() {
        let err = FrappeEnvelope::parse("<html>ok</html>", 200).unwrap_err();
        assert!(matches!(err, ChatError::Decode(_)));
    }
}
