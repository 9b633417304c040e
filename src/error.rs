use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failure of a single backend call. Nothing is retried; the caller decides
/// how to surface it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response. `message` carries the backend `detail` when present.
    #[error("HTTP {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        data: Option<Value>,
    },

    /// 2xx response whose body did not match the expected shape.
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// Rejected before any I/O happened.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Builds a `Status` error from a response body, preferring FastAPI's
    /// `detail` field over the canonical reason phrase.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let data = serde_json::from_str::<Value>(body).ok();
        let detail = data.as_ref().and_then(|v| match v.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        });
        let message = detail.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
        Self::Status { status, message, data }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Short text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Could not reach the PawBond server".to_string(),
            Self::Status { message, .. } => message.clone(),
            Self::Decode { .. } => "The server sent an unexpected response".to_string(),
            Self::InvalidRequest(reason) => reason.clone(),
        }
    }
}
