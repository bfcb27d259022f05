//! Client-side session and credential lifecycle for the BekoSIRS apps.
//!
//! The crate is organised leaf to root:
//!
//! - [`storage`]: secure key-value persistence for tokens and the biometric
//!   registration, backed by the OS keychain or an encrypted file
//! - [`api`]: the single outbound request pipeline that attaches the bearer
//!   token and classifies failures
//! - [`biometric`]: the biometric gate (opt-in, opt-out, unlock)
//! - [`auth`]: the owned [`auth::Session`] value and the [`auth::SessionController`]
//!   entry points (login, logout, register, refresh, password reset)

pub mod api;
pub mod auth;
pub mod biometric;
pub mod config;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, FailureKind};
pub use auth::{AuthError, LoginOutcome, Session, SessionController, SessionHandle};
pub use biometric::{BiometricGate, BiometricPrompt, BiometricResult, UnlockOutcome};
pub use config::Config;
pub use storage::{CredentialKey, CredentialStore, SecureStorage, StorageError};
