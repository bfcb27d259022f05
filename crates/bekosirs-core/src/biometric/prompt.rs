use std::future::Future;

use serde::Serialize;

/// Biometric modality, for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum BiometricKind {
    Face,
    Fingerprint,
    Iris,
}

/// What the device reports about its biometric hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BiometricCapabilities {
    pub has_hardware: bool,
    pub is_enrolled: bool,
    pub kinds: Vec<BiometricKind>,
}

impl BiometricCapabilities {
    pub fn unavailable() -> Self {
        Self {
            has_hardware: false,
            is_enrolled: false,
            kinds: Vec::new(),
        }
    }

    /// Hardware present and at least one credential enrolled.
    pub fn is_available(&self) -> bool {
        self.has_hardware && self.is_enrolled
    }

    /// Label for the preferred modality: face, then fingerprint, then iris.
    pub fn label(&self) -> &'static str {
        if self.kinds.contains(&BiometricKind::Face) {
            "Face ID"
        } else if self.kinds.contains(&BiometricKind::Fingerprint) {
            "Fingerprint"
        } else if self.kinds.contains(&BiometricKind::Iris) {
            "Iris"
        } else {
            "Biometrics"
        }
    }
}

/// Result of one biometric challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Granted,
    /// The user cancelled, or the match failed and they gave up.
    Declined,
    /// The hardware could not run the challenge (locked out, removed, not enrolled).
    Unavailable,
}

/// The device's biometric hardware, as a capability.
///
/// Each call suspends until the platform resolves it.
pub trait BiometricPrompt: Send + Sync {
    fn capabilities(&self) -> impl Future<Output = BiometricCapabilities> + Send;

    /// Present a challenge with a human-readable reason.
    fn challenge(&self, reason: &str) -> impl Future<Output = PromptOutcome> + Send;
}
