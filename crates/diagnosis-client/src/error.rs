use diagnosis_common::{ErrorResponse, FieldError};
use reqwest::StatusCode;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// The service answered with a non-success status.
    #[error("diagnosis api returned {status}: {message}")]
    Api { status: u16, message: String },
    /// The payload was rejected locally; nothing was sent.
    #[error("invalid request: {}", join_details(.0))]
    Validation(Vec<FieldError>),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Build an `Api` error from a failed response body.
    ///
    /// The message is the summary of the body's validation details when there
    /// are any, else the envelope's `error` category. The envelope's `message`
    /// is not used. A body that is not an error envelope yields the HTTP
    /// reason phrase.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let message = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(envelope) => api_message(&envelope),
            Err(_) => reason(status),
        };
        Self::Api {
            status: status.as_u16(),
            message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

fn api_message(envelope: &ErrorResponse) -> String {
    match &envelope.details {
        Some(details) if !details.is_empty() => envelope.summary(),
        _ => envelope.error.clone(),
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

fn join_details(details: &[FieldError]) -> String {
    details
        .iter()
        .map(|detail| format!("{}: {}", detail.field, detail.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_details_become_the_message() {
        let body = json!({
            "success": false,
            "error": "Validation error",
            "details": [
                { "field": "diagnosisName", "message": "Diagnosis name is required" },
                { "field": "justification", "message": "Justification is required" }
            ]
        });
        let err = ClientError::from_response(StatusCode::BAD_REQUEST, body.to_string().as_bytes());
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(
                    message,
                    "diagnosisName: Diagnosis name is required, justification: Justification is required"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_category_used_without_details() {
        let body = json!({
            "success": false,
            "error": "Not found",
            "message": "Diagnosis not found"
        });
        let err = ClientError::from_response(StatusCode::NOT_FOUND, body.to_string().as_bytes());
        assert!(matches!(
            err,
            ClientError::Api { status: 404, ref message } if message == "Not found"
        ));
    }

    #[test]
    fn empty_details_fall_back_to_error_category() {
        let body = json!({
            "success": false,
            "error": "Validation error",
            "message": "Request body failed validation",
            "details": []
        });
        let err = ClientError::from_response(StatusCode::BAD_REQUEST, body.to_string().as_bytes());
        assert!(matches!(
            err,
            ClientError::Api { status: 400, ref message } if message == "Validation error"
        ));
    }

    #[test]
    fn non_json_body_falls_back_to_reason_phrase() {
        let err = ClientError::from_response(StatusCode::BAD_GATEWAY, b"<html>upstream</html>");
        assert!(matches!(
            err,
            ClientError::Api { status: 502, ref message } if message == "Bad Gateway"
        ));
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn validation_error_display_lists_fields() {
        let err = ClientError::Validation(vec![FieldError::new(
            "justification",
            "Justification is required",
        )]);
        assert_eq!(
            err.to_string(),
            "invalid request: justification: Justification is required"
        );
    }
}
