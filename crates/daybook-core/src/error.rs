use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaybookError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Text generation error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl DaybookError {
    /// Returns `true` when the failure came from talking to an external
    /// service (store, identity provider, bucket, text generator) rather than
    /// from the request itself.
    pub fn is_upstream(&self) -> bool {
        match self {
            Self::Http(_) | Self::Llm(_) => true,
            Self::Storage(msg) => is_unreachable_message(msg),
            _ => false,
        }
    }
}

fn is_unreachable_message(msg: &str) -> bool {
    let msg_lower = msg.to_lowercase();
    let patterns = [
        "connection refused",
        "timed out",
        "connect error",
        "dns error",
        "error sending request",
    ];
    patterns.iter().any(|p| msg_lower.contains(p))
}

pub type Result<T> = std::result::Result<T, DaybookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_is_upstream() {
        let err = DaybookError::Llm("Gemini error 503".into());
        assert!(err.is_upstream());
    }

    #[test]
    fn test_storage_connection_refused_is_upstream() {
        let err = DaybookError::Storage("remote store: Connection refused (os error 111)".into());
        assert!(err.is_upstream());
    }

    #[test]
    fn test_storage_sql_error_is_not_upstream() {
        let err = DaybookError::Storage("no such column: foo".into());
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_validation_errors_are_not_upstream() {
        assert!(!DaybookError::InvalidInput("content cannot be empty".into()).is_upstream());
        assert!(!DaybookError::Conflict("duplicate".into()).is_upstream());
        assert!(!DaybookError::NotFound("activity".into()).is_upstream());
    }

    #[test]
    fn test_display_includes_message() {
        let err = DaybookError::Conflict("a work memo already exists for 2024-05-01".into());
        assert_eq!(
            err.to_string(),
            "Conflict: a work memo already exists for 2024-05-01"
        );
    }
}
