//! Session entry points: login, logout, registration, token refresh and
//! password reset.
//!
//! The controller owns the [`Session`] and is the only thing that changes it.
//! Everything it does goes through the shared [`ApiClient`] and
//! [`CredentialStore`].

use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{AuthError, Session, SessionHandle};
use crate::api::endpoints;
use crate::api::types::{
    PasswordResetConfirm, PasswordResetRequest, PasswordResetResponse, Profile, RefreshRequest,
    RefreshResponse, RegisterBody, RegisteredUser, RegistrationRequest, TokenRequest,
    TokenResponse,
};
use crate::api::{ApiClient, ApiError};
use crate::biometric::{BiometricGate, BiometricPrompt, UnlockOutcome};
use crate::storage::CredentialStore;

/// Accounts created from the client are always customers.
const CUSTOMER_ROLE: &str = "customer";

/// Minimum password length accepted before asking the server.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LoginOutcome {
    pub username: String,
    pub role: Option<String>,
}

pub struct SessionController {
    api: ApiClient,
    credentials: CredentialStore,
    session: Session,
    platform: String,
}

impl SessionController {
    /// Build the controller and compute the initial session from storage.
    pub fn new(api: ApiClient, platform: impl Into<String>) -> Self {
        let credentials = api.credentials().clone();
        let session = Session::new(credentials.has_session());
        Self {
            api,
            credentials,
            session,
            platform: platform.into(),
        }
    }

    pub fn session(&self) -> SessionHandle {
        self.session.handle()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Recompute the session from storage.
    pub fn boot(&self) -> bool {
        let authenticated = self.credentials.has_session();
        self.session.set(authenticated);
        debug!(authenticated, "Session booted from credential store");
        authenticated
    }

    /// Exchange username and password for tokens and open the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Username and password are required".into(),
            ));
        }

        let request = TokenRequest {
            username,
            password,
            platform: &self.platform,
        };
        let tokens: TokenResponse = self
            .api
            .request_anonymous(Method::POST, endpoints::TOKEN, Some(&request))
            .await
            .map_err(|e| match e.status().map(|s| s.as_u16()) {
                Some(401) => AuthError::InvalidCredentials,
                Some(403) => AuthError::Forbidden(e.server_message().unwrap_or_else(|| {
                    "This account cannot sign in on this platform".into()
                })),
                _ => e.into(),
            })?;

        if tokens.access.is_empty() || tokens.refresh.is_empty() {
            return Err(AuthError::Fatal("Login response did not contain tokens".into()));
        }

        self.credentials.save_tokens(&tokens.access, &tokens.refresh)?;
        self.session.set(true);

        let outcome = LoginOutcome {
            username: tokens.username.unwrap_or_else(|| username.to_string()),
            role: tokens.role,
        };
        info!(username = %outcome.username, role = ?outcome.role, "Logged in");
        Ok(outcome)
    }

    /// Clear both tokens and close the session. The biometric registration
    /// is left in place so biometric unlock keeps working after a manual
    /// logout.
    pub fn logout(&self) -> Result<(), AuthError> {
        let result = self.credentials.clear_tokens();
        self.session.set(false);
        info!("Logged out");
        result.map_err(AuthError::from)
    }

    /// Create an account. No session side effects; the user logs in afterwards.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegisteredUser, AuthError> {
        validate_registration(request)?;

        let body = RegisterBody {
            username: request.username.trim(),
            email: request.email.trim(),
            password: &request.password,
            first_name: request.first_name.trim(),
            last_name: request.last_name.trim(),
            role: CUSTOMER_ROLE,
            phone_number: request
                .phone_number
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty()),
        };
        let user: RegisteredUser = self
            .api
            .request_anonymous(Method::POST, endpoints::USERS, Some(&body))
            .await?;

        info!(username = body.username, user_id = ?user.user_id, "Account registered");
        Ok(user)
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// A rejected refresh token ends the session. The biometric registration
    /// is not touched.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let Some(refresh) = self.credentials.refresh_token() else {
            self.session.set(false);
            return Err(AuthError::NotAuthenticated);
        };

        let request = RefreshRequest { refresh: &refresh };
        match self
            .api
            .request_anonymous::<RefreshResponse, _>(Method::POST, endpoints::TOKEN_REFRESH, Some(&request))
            .await
        {
            Ok(tokens) => {
                self.credentials
                    .rotate_tokens(&tokens.access, tokens.refresh.as_deref())?;
                self.session.set(true);
                debug!(rotated = tokens.refresh.is_some(), "Access token refreshed");
                Ok(())
            }
            Err(e) => Err(self.expire_on_unauthorized(e)),
        }
    }

    /// `GET profile/` for the signed-in user.
    pub async fn fetch_profile(&self) -> Result<Profile, AuthError> {
        self.api
            .get(endpoints::PROFILE)
            .await
            .map_err(|e| self.expire_on_unauthorized(e))
    }

    /// Ask for a password reset email. The backend answers the same way
    /// whether or not the address is registered.
    pub async fn request_password_reset(&self, email: &str) -> Result<String, AuthError> {
        let email = email.trim();
        validate_email(email)?;

        let response: PasswordResetResponse = self
            .api
            .request_anonymous(
                Method::POST,
                endpoints::PASSWORD_RESET,
                Some(&PasswordResetRequest { email }),
            )
            .await?;
        Ok(response
            .message
            .unwrap_or_else(|| "If the address is registered, a reset link has been sent".into()))
    }

    /// Set a new password using the token from the reset email.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidInput("Reset token is required".into()));
        }
        validate_new_password(new_password, confirm_password)?;

        let body = PasswordResetConfirm {
            token,
            new_password,
            confirm_password,
        };
        let response: PasswordResetResponse = self
            .api
            .request_anonymous(Method::POST, endpoints::PASSWORD_RESET_CONFIRM, Some(&body))
            .await?;
        if !response.success {
            return Err(AuthError::InvalidInput(
                response.error.unwrap_or_else(|| "Password reset failed".into()),
            ));
        }
        Ok(response
            .message
            .unwrap_or_else(|| "Password has been reset".into()))
    }

    /// Run a biometric unlock and open the session when it succeeds.
    pub async fn unlock_with_biometrics<P: BiometricPrompt>(
        &self,
        gate: &BiometricGate<P>,
    ) -> Result<UnlockOutcome, AuthError> {
        let outcome = gate.authenticate().await?;
        if let UnlockOutcome::Unlocked { .. } = outcome {
            self.session.set(true);
        }
        Ok(outcome)
    }

    /// A 401 on an authenticated call means the tokens are dead: drop them
    /// and close the session.
    fn expire_on_unauthorized(&self, err: ApiError) -> AuthError {
        if !err.is_unauthorized() {
            return err.into();
        }
        warn!("Server rejected credentials, ending session");
        if let Err(e) = self.credentials.clear_tokens() {
            warn!(error = %e, "Failed to clear rejected tokens");
        }
        self.session.set(false);
        AuthError::SessionExpired
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::InvalidInput("Email is required".into()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AuthError::InvalidInput(format!("{:?} is not a valid email address", email))),
    }
}

fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password != confirmation {
        return Err(AuthError::InvalidInput("Passwords do not match".into()));
    }
    Ok(())
}

fn validate_registration(request: &RegistrationRequest) -> Result<(), AuthError> {
    for (field, value) in [
        ("Username", &request.username),
        ("First name", &request.first_name),
        ("Last name", &request.last_name),
    ] {
        if value.trim().is_empty() {
            return Err(AuthError::InvalidInput(format!("{} is required", field)));
        }
    }
    validate_email(request.email.trim())?;
    validate_new_password(&request.password, &request.password_confirm)
}
