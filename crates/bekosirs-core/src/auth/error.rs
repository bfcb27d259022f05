use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// User-facing failure categories for the session and biometric flows.
///
/// Raw transport errors never escape as-is; they are mapped into these.
/// A declined biometric prompt is not an error and has no variant here.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot reach the server")]
    Unreachable,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Biometric unlock is not set up on this device")]
    BiometricNotConfigured,

    #[error("Biometric authentication is not available on this device")]
    BiometricUnavailable,

    #[error("Biometric unlock is already enabled")]
    BiometricAlreadyEnabled,

    #[error("The server rejected the biometric registration: {0}")]
    RegistrationRejected(String),

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Credential storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Client error: {0}")]
    Fatal(String),
}

impl AuthError {
    /// Stable machine-readable code, for UI layers and serialised results.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid-credentials",
            AuthError::NotAuthenticated => "not-authenticated",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::Unreachable => "unreachable",
            AuthError::InvalidInput(_) => "invalid-input",
            AuthError::BiometricNotConfigured => "biometric-not-configured",
            AuthError::BiometricUnavailable => "biometric-unavailable",
            AuthError::BiometricAlreadyEnabled => "biometric-already-enabled",
            AuthError::RegistrationRejected(_) => "registration-rejected",
            AuthError::SessionExpired => "session-expired",
            AuthError::Storage(_) => "storage",
            AuthError::Server { .. } => "server-error",
            AuthError::Fatal(_) => "client-error",
        }
    }

    /// The user has to sign in again to get past this.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated | AuthError::SessionExpired
        )
    }
}

/// Generic mapping. Flows with more specific meanings for a status (login's
/// 401, biometric verification's 400) match on the `ApiError` first.
impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Server { status, .. } => {
                let message = err.server_message();
                match status.as_u16() {
                    401 => AuthError::NotAuthenticated,
                    403 => AuthError::Forbidden(
                        message.unwrap_or_else(|| "This account cannot perform that action".into()),
                    ),
                    400 => {
                        AuthError::InvalidInput(message.unwrap_or_else(|| "Invalid request".into()))
                    }
                    _ => AuthError::Server {
                        status: status.as_u16(),
                        message: message.unwrap_or_else(|| {
                            status.canonical_reason().unwrap_or("Unknown error").to_string()
                        }),
                    },
                }
            }
            ApiError::Unreachable(_) => AuthError::Unreachable,
            ApiError::Setup(_) | ApiError::Decode { .. } => AuthError::Fatal(err.to_string()),
        }
    }
}
