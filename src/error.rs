use thiserror::Error;

/// Type alias for Result with AssistantError
pub type Result<T> = std::result::Result<T, AssistantError>;

/// Error types for the email assistant
///
/// Remote-call failures carry the collaborator they came from so stage
/// logic can branch on outcome instead of intercepting control flow.
#[derive(Error, Debug)]
pub enum AssistantError {
    /// Gmail API returned an error
    #[error("Mail service error: {0}")]
    Mail(String),

    /// Calendar API returned an error
    #[error("Calendar service error: {0}")]
    Calendar(String),

    /// Text-completion call failed
    #[error("Completion error: {0}")]
    Completion(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid or unparseable message payload
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Unknown or unusable timezone identifier
    #[error("Unknown timezone: {0}")]
    Timezone(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<google_gmail1::Error> for AssistantError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                AssistantError::Mail(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ))
            }
            google_gmail1::Error::BadRequest(ref err) => {
                AssistantError::Mail(format!("bad request: {}", err))
            }
            google_gmail1::Error::HttpError(ref err) => {
                AssistantError::Mail(format!("connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => AssistantError::Mail(err.to_string()),
            _ => AssistantError::Mail(error.to_string()),
        }
    }
}

impl AssistantError {
    /// Convert a Google Calendar API error into a `Calendar` error.
    ///
    /// Calendar and Gmail both re-export the same `google_apis_common::Error`
    /// type, so they cannot each have a distinct blanket `From` impl. Gmail
    /// keeps the `From` impl (used via `?`); calendar call sites convert
    /// explicitly through this constructor to preserve the `Calendar` variant.
    pub fn from_calendar(error: google_calendar3::Error) -> Self {
        match error {
            google_calendar3::Error::Failure(ref response) => {
                let status = response.status();
                AssistantError::Calendar(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ))
            }
            google_calendar3::Error::BadRequest(ref err) => {
                AssistantError::Calendar(format!("bad request: {}", err))
            }
            google_calendar3::Error::HttpError(ref err) => {
                AssistantError::Calendar(format!("connection error: {}", err))
            }
            google_calendar3::Error::Io(err) => AssistantError::Calendar(err.to_string()),
            _ => AssistantError::Calendar(error.to_string()),
        }
    }
}

impl From<async_openai::error::OpenAIError> for AssistantError {
    fn from(error: async_openai::error::OpenAIError) -> Self {
        AssistantError::Completion(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AssistantError::Mail("quota exceeded".to_string());
        assert!(format!("{}", error).contains("Mail service error"));

        let error = AssistantError::Calendar("insert rejected".to_string());
        assert!(format!("{}", error).contains("Calendar service error"));

        let error = AssistantError::Timezone("Mars/Olympus".to_string());
        assert!(format!("{}", error).contains("Unknown timezone"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AssistantError = io_err.into();
        assert!(matches!(err, AssistantError::Io(_)));
    }
}
