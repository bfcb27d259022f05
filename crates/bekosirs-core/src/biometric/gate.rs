//! Biometric unlock: opt-in, opt-out, and token exchange after a successful
//! challenge.
//!
//! State is the pair (availability, enrollment). Availability is probed once
//! and cached; enrollment is read from the credential store on every call.
//! Only `Available × NotEnabled` may enable, only `Available × Enabled` may
//! authenticate, and `disable` is valid anywhere.

use reqwest::Method;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::device::generate_device_id;
use super::prompt::{BiometricCapabilities, BiometricPrompt, PromptOutcome};
use super::{EnableOutcome, UnlockOutcome};
use crate::api::endpoints;
use crate::api::types::{
    BiometricDisableResponse, BiometricEnableRequest, BiometricEnableResponse, BiometricStatus,
    RefreshRequest, RefreshResponse, VerifyDeviceRequest, VerifyDeviceResponse,
};
use crate::api::ApiClient;
use crate::auth::AuthError;
use crate::storage::CredentialStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Unavailable,
    Available,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    NotEnabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    pub availability: Availability,
    pub enrollment: Enrollment,
}

impl GateState {
    pub fn can_enable(&self) -> bool {
        self.availability == Availability::Available && self.enrollment == Enrollment::NotEnabled
    }

    pub fn can_authenticate(&self) -> bool {
        self.availability == Availability::Available && self.enrollment == Enrollment::Enabled
    }
}

pub struct BiometricGate<P> {
    prompt: P,
    api: ApiClient,
    credentials: CredentialStore,
    platform: String,
    capabilities: OnceCell<BiometricCapabilities>,
}

impl<P: BiometricPrompt> BiometricGate<P> {
    pub fn new(prompt: P, api: ApiClient, platform: impl Into<String>) -> Self {
        let credentials = api.credentials().clone();
        Self {
            prompt,
            api,
            credentials,
            platform: platform.into(),
            capabilities: OnceCell::new(),
        }
    }

    /// Probe the hardware on first call; later calls return the cached answer.
    pub async fn check_availability(&self) -> &BiometricCapabilities {
        self.capabilities
            .get_or_init(|| async {
                let caps = self.prompt.capabilities().await;
                info!(
                    available = caps.is_available(),
                    kind = caps.label(),
                    "Biometric capabilities checked"
                );
                caps
            })
            .await
    }

    /// True iff a complete registration is stored. Leftover partial state is
    /// cleared on the way.
    pub fn is_enabled(&self) -> bool {
        if self.credentials.biometric_registration().is_some() {
            return true;
        }
        self.clear_residue();
        false
    }

    pub fn state(&self) -> GateState {
        let availability = match self.capabilities.get() {
            None => Availability::Unknown,
            Some(caps) if caps.is_available() => Availability::Available,
            Some(_) => Availability::Unavailable,
        };
        let enrollment = if self.is_enabled() {
            Enrollment::Enabled
        } else {
            Enrollment::NotEnabled
        };
        GateState {
            availability,
            enrollment,
        }
    }

    fn clear_residue(&self) {
        if self.credentials.has_biometric_residue() {
            warn!("Incomplete biometric registration found, clearing it");
            if let Err(e) = self.credentials.clear_biometric_registration() {
                warn!(error = %e, "Failed to clear incomplete biometric registration");
            }
        }
    }

    /// Opt in to biometric unlock for `user_id`, mirroring `refresh_token`.
    ///
    /// Nothing is persisted unless the backend accepted the binding.
    pub async fn enable(&self, user_id: i64, refresh_token: &str) -> Result<EnableOutcome, AuthError> {
        let caps = self.check_availability().await;
        if !caps.is_available() {
            return Err(AuthError::BiometricUnavailable);
        }
        let label = caps.label();
        if self.is_enabled() {
            return Err(AuthError::BiometricAlreadyEnabled);
        }
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidInput("A refresh token is required".into()));
        }

        let reason = format!("Confirm your identity to turn on {} sign-in", label);
        match self.prompt.challenge(&reason).await {
            PromptOutcome::Granted => {}
            PromptOutcome::Declined => {
                info!("Biometric enable cancelled by user");
                return Ok(EnableOutcome::Cancelled);
            }
            PromptOutcome::Unavailable => return Err(AuthError::BiometricUnavailable),
        }

        let device_id = self
            .credentials
            .device_id()
            .unwrap_or_else(|| generate_device_id(&self.platform));

        let request = BiometricEnableRequest {
            device_id: &device_id,
            refresh_token,
        };
        let response: BiometricEnableResponse = self
            .api
            .post(endpoints::BIOMETRIC_ENABLE, &request)
            .await
            .map_err(|e| match e.status().map(|s| s.as_u16()) {
                Some(400) | Some(409) => AuthError::RegistrationRejected(
                    e.server_message().unwrap_or_else(|| "Device binding refused".into()),
                ),
                _ => e.into(),
            })?;
        if !(response.success || response.biometric_enabled) {
            return Err(AuthError::RegistrationRejected(
                response
                    .message
                    .unwrap_or_else(|| "Server did not confirm the binding".into()),
            ));
        }

        if let Err(e) = self
            .credentials
            .save_biometric_registration(user_id, &device_id, refresh_token)
        {
            warn!(error = %e, "Failed to persist biometric registration, undoing server binding");
            self.notify_backend_disable().await;
            return Err(e.into());
        }

        info!(user_id, device_id = %device_id, "Biometric unlock enabled");
        Ok(EnableOutcome::Enabled { device_id })
    }

    /// Opt out. The backend is told on a best-effort basis; the local
    /// registration is always removed. Safe to call repeatedly.
    pub async fn disable(&self) -> Result<(), AuthError> {
        self.notify_backend_disable().await;
        self.credentials.clear_biometric_registration()?;
        info!("Biometric unlock disabled");
        Ok(())
    }

    async fn notify_backend_disable(&self) {
        if self.credentials.access_token().is_none() {
            debug!("No session, skipping backend biometric disable");
            return;
        }
        match self
            .api
            .request::<BiometricDisableResponse, ()>(Method::POST, endpoints::BIOMETRIC_DISABLE, None)
            .await
        {
            Ok(resp) if resp.biometric_enabled => {
                warn!(success = resp.success, "Backend still reports biometric enabled, continuing")
            }
            Ok(_) => debug!("Backend biometric binding removed"),
            Err(e) => warn!(error = %e, "Backend biometric disable failed, continuing"),
        }
    }

    /// Unlock with biometrics: challenge, verify the device, exchange the
    /// mirrored refresh token.
    ///
    /// A rejected device or refresh token means the registration is dead; it
    /// is removed and `SessionExpired` is returned.
    pub async fn authenticate(&self) -> Result<UnlockOutcome, AuthError> {
        let Some(registration) = self.credentials.biometric_registration() else {
            self.clear_residue();
            return Err(AuthError::BiometricNotConfigured);
        };

        let caps = self.check_availability().await;
        if !caps.is_available() {
            return Err(AuthError::BiometricUnavailable);
        }

        let reason = format!("Sign in with {}", caps.label());
        match self.prompt.challenge(&reason).await {
            PromptOutcome::Granted => {}
            PromptOutcome::Declined => {
                info!("Biometric unlock cancelled by user");
                return Ok(UnlockOutcome::Cancelled);
            }
            PromptOutcome::Unavailable => return Err(AuthError::BiometricUnavailable),
        }

        let verify = VerifyDeviceRequest {
            user_id: registration.user_id,
            device_id: &registration.device_id,
        };
        let verified = self
            .api
            .request_anonymous::<VerifyDeviceResponse, _>(
                Method::POST,
                endpoints::BIOMETRIC_VERIFY_DEVICE,
                Some(&verify),
            )
            .await;
        match verified {
            Ok(resp) if resp.success => {
                debug!(user_id = registration.user_id, "Device verified");
            }
            Ok(resp) => {
                let reason = resp.error.unwrap_or_else(|| "verification refused".into());
                return Err(self.invalidate(&reason).await);
            }
            Err(e) if matches!(e.status().map(|s| s.as_u16()), Some(400 | 401 | 404)) => {
                let reason = e.server_message().unwrap_or_else(|| e.to_string());
                return Err(self.invalidate(&reason).await);
            }
            Err(e) => return Err(e.into()),
        }

        let refresh = RefreshRequest {
            refresh: &registration.refresh_token,
        };
        let refreshed: RefreshResponse = match self
            .api
            .request_anonymous(Method::POST, endpoints::TOKEN_REFRESH, Some(&refresh))
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_unauthorized() => {
                return Err(self.invalidate("refresh token rejected").await);
            }
            Err(e) => return Err(e.into()),
        };

        let new_refresh = refreshed
            .refresh
            .as_deref()
            .unwrap_or(&registration.refresh_token);
        self.credentials
            .rotate_tokens(&refreshed.access, Some(new_refresh))?;

        info!(
            user_id = registration.user_id,
            rotated = refreshed.refresh.is_some(),
            "Biometric unlock succeeded"
        );
        Ok(UnlockOutcome::Unlocked {
            access_token: refreshed.access,
        })
    }

    /// `GET biometric/status/` for the signed-in user.
    pub async fn server_status(&self) -> Result<BiometricStatus, AuthError> {
        Ok(self.api.get(endpoints::BIOMETRIC_STATUS).await?)
    }

    async fn invalidate(&self, reason: &str) -> AuthError {
        warn!(reason = reason, "Biometric registration rejected by server, removing it");
        if let Err(e) = self.disable().await {
            warn!(error = %e, "Failed to remove rejected biometric registration");
        }
        AuthError::SessionExpired
    }
}
