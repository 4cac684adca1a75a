use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Error payload returned by the management service.
#[derive(Deserialize, Debug, Clone)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

/// The service wraps its error payload in a top-level `error` key.
#[derive(Deserialize, Debug)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

impl Default for ApiErrorBody {
    fn default() -> Self {
        ApiErrorBody {
            code: "Unknown".to_string(),
            message: "An unknown error occurred".to_string(),
        }
    }
}

impl Display for ApiErrorBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Code: {}, Message: {}", self.code, self.message)
    }
}

impl ApiErrorBody {
    /// Parses a raw response body, falling back to the body text as message.
    pub fn from_response_text(text: &str) -> Self {
        serde_json::from_str::<ApiErrorEnvelope>(text)
            .map(|envelope| envelope.error)
            .or_else(|_| serde_json::from_str::<ApiErrorBody>(text))
            .unwrap_or_else(|_| ApiErrorBody {
                message: if text.is_empty() {
                    ApiErrorBody::default().message
                } else {
                    text.to_string()
                },
                ..ApiErrorBody::default()
            })
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Resource not found")]
    NotFound,
    #[error("Unauthorized access")]
    Unauthorized,
    #[error("Forbidden access")]
    Forbidden,
    #[error("Api error {status}: {body}")]
    ApiError {
        status: StatusCode,
        body: ApiErrorBody,
    },
    #[error("Invalid request url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown Error: {0}")]
    UnknownError(String),
}

impl ClientError {
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::ApiError { body, .. } => Some(body.code.as_str()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
            || matches!(self, ClientError::ApiError { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn is_login_error(&self) -> bool {
        matches!(self, ClientError::Unauthorized | ClientError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_error_body() {
        let body = ApiErrorBody::from_response_text(
            r#"{"error": {"code": "UserError", "message": "Asset paths cannot be updated."}}"#,
        );
        assert_eq!(body.code, "UserError");
        assert_eq!(body.message, "Asset paths cannot be updated.");
    }

    #[test]
    fn falls_back_to_raw_text() {
        let body = ApiErrorBody::from_response_text("gateway timeout");
        assert_eq!(body.code, "Unknown");
        assert_eq!(body.message, "gateway timeout");
    }

    #[test]
    fn not_found_is_detected_from_status() {
        let err = ClientError::ApiError {
            status: StatusCode::NOT_FOUND,
            body: ApiErrorBody::default(),
        };
        assert!(err.is_not_found());
        assert!(ClientError::NotFound.is_not_found());
        assert!(!ClientError::Unauthorized.is_not_found());
    }
}
