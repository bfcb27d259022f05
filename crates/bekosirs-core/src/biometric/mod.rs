//! Biometric unlock.
//!
//! This module provides:
//! - `BiometricPrompt`: the hardware prompt as a capability interface
//! - `BiometricGate`: enable / disable / authenticate over the credential store
//!   and the backend's `biometric/*` endpoints
//! - `BiometricResult`: a flat, serialisable view of an unlock attempt for UI layers

pub mod device;
pub mod gate;
pub mod prompt;

use serde::Serialize;

use crate::auth::AuthError;

pub use gate::{Availability, BiometricGate, Enrollment, GateState};
pub use prompt::{BiometricCapabilities, BiometricKind, BiometricPrompt, PromptOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableOutcome {
    Enabled { device_id: String },
    /// The user dismissed the prompt. Nothing was changed.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked { access_token: String },
    /// The user dismissed the prompt. Not an error; nothing was changed.
    Cancelled,
}

/// Unlock attempt flattened for a UI layer.
///
/// `cancelled` results carry no error so the caller can stay quiet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BiometricResult {
    pub success: bool,
    pub cancelled: bool,
    pub access_token: Option<String>,
    pub error: Option<String>,
}

impl From<Result<UnlockOutcome, AuthError>> for BiometricResult {
    fn from(result: Result<UnlockOutcome, AuthError>) -> Self {
        match result {
            Ok(UnlockOutcome::Unlocked { access_token }) => Self {
                success: true,
                cancelled: false,
                access_token: Some(access_token),
                error: None,
            },
            Ok(UnlockOutcome::Cancelled) => Self {
                success: false,
                cancelled: true,
                access_token: None,
                error: None,
            },
            Err(e) => Self {
                success: false,
                cancelled: false,
                access_token: None,
                error: Some(e.code().to_string()),
            },
        }
    }
}
