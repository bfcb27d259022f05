use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Outbound request failures.
///
/// Every transport outcome lands in one of three buckets (see [`FailureKind`]):
/// the server answered with an error status, no answer arrived, or the request
/// could not be built in the first place.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server returned {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("Server unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Request could not be built: {0}")]
    Setup(String),

    #[error("Unexpected response body from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The three-way classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server said no; status and body are available.
    ServerRejected,
    /// We couldn't reach the server (connect, DNS, timeout).
    Unreachable,
    /// Configuration or programming error; retrying will not help.
    Fatal,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// DRF error payloads: `{"detail": ...}` from exceptions, `{"error": ...}`
/// from the hand-written views.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Server {
            status,
            body: Self::truncate_body(body),
        }
    }

    /// Classify a reqwest failure. Builder errors never left the process.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::Setup(err.to_string())
        } else {
            ApiError::Unreachable(err)
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Server { .. } => FailureKind::ServerRejected,
            ApiError::Unreachable(_) => FailureKind::Unreachable,
            ApiError::Setup(_) | ApiError::Decode { .. } => FailureKind::Fatal,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Human-readable message from a DRF error body, if there is one.
    pub fn server_message(&self) -> Option<String> {
        let ApiError::Server { body, .. } = self else {
            return None;
        };
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            if let Some(message) = parsed.detail.or(parsed.error).or(parsed.message) {
                return Some(message);
            }
        }
        // Field validation errors: {"email": ["..."], ...}
        let fields: serde_json::Map<String, serde_json::Value> = serde_json::from_str(body).ok()?;
        fields.iter().find_map(|(field, value)| {
            let first = value.as_array()?.first()?.as_str()?;
            Some(format!("{field}: {first}"))
        })
    }
}
