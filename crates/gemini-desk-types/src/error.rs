use thiserror::Error;

/// Failures scoped to a single chat turn or panel action.
///
/// The `Display` text is what ends up in the `Error: ...` bubble, so it
/// carries the reason only.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("A response is still in progress")]
    Busy,

    #[error("{0}")]
    Transport(String),

    #[error("{message}")]
    Server {
        exc_type: Option<String>,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("The start date must not be after the end date")]
    InvalidDateRange,
}

impl ChatError {
    pub fn transport(msg: impl Into<String>) -> Self {
        ChatError::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ChatError::Protocol(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_is_bare_reason() {
        assert_eq!(ChatError::transport("Timeout").to_string(), "Timeout");
    }

    #[test]
    fn test_server_display_uses_message() {
        let err = ChatError::Server {
            exc_type: Some("ValidationError".to_string()),
            message: "Gemini API Key not found".to_string(),
        };
        assert_eq!(err.to_string(), "Gemini API Key not found");
    }
}
