use std::fmt;

use serde::{Deserialize, Serialize};
use transfer_client::TransferError;

/// The body of every failed server response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status_code: u16,
}

impl ApiError {
    /// Parses a failure body.  Returns `None` when the body is not of the expected shape.
    pub fn from_body(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// The server error carried by a transfer failure, if that is what it is.
    pub fn from_transfer_error(err: &TransferError) -> Option<Self> {
        match err {
            TransferError::Server { status, body } => Some(Self::from_body(body).unwrap_or_else(|| Self {
                message: body.clone(),
                status_code: status.as_u16(),
            })),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = if self.message.is_empty() {
            "Unknown server error"
        } else {
            self.message.as_str()
        };
        write!(f, "({}) {}", self.status_code, message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn test_parse_body() {
        let err = ApiError::from_body(r#"{"status_code": 404, "message": "not found"}"#).unwrap();
        assert_eq!(err.status_code, 404);
        assert_eq!(err.to_string(), "(404) not found");

        assert!(ApiError::from_body("<html>gateway timeout</html>").is_none());
    }

    #[test]
    fn test_empty_message() {
        let err = ApiError::from_body(r#"{"status_code": 500}"#).unwrap();
        assert_eq!(err.to_string(), "(500) Unknown server error");
    }

    #[test]
    fn test_from_transfer_error() {
        let err = TransferError::Server {
            status: StatusCode::BAD_GATEWAY,
            body: "upstream down".into(),
        };
        let api = ApiError::from_transfer_error(&err).unwrap();
        assert_eq!(api.status_code, 502);
        assert_eq!(api.message, "upstream down");

        assert!(ApiError::from_transfer_error(&TransferError::Cancelled).is_none());
    }
}
