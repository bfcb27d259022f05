//! REST API client module for the BekoSIRS backend.
//!
//! This module provides the `ApiClient` every feature sends requests through,
//! the `ApiError` transport classification, and the request/response bodies
//! of the authentication endpoints.
//!
//! The backend uses JWT bearer tokens issued by `token/` and renewed by
//! `token/refresh/`.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, ApiResponse};
pub use error::{ApiError, FailureKind};

/// Endpoint paths, relative to the configured base URL.
pub mod endpoints {
    pub const TOKEN: &str = "token/";
    pub const TOKEN_REFRESH: &str = "token/refresh/";
    pub const BIOMETRIC_ENABLE: &str = "biometric/enable/";
    pub const BIOMETRIC_DISABLE: &str = "biometric/disable/";
    pub const BIOMETRIC_STATUS: &str = "biometric/status/";
    pub const BIOMETRIC_VERIFY_DEVICE: &str = "biometric/verify-device/";
    pub const USERS: &str = "users/";
    pub const PROFILE: &str = "profile/";
    pub const PASSWORD_RESET: &str = "password-reset/";
    pub const PASSWORD_RESET_CONFIRM: &str = "password-reset/confirm/";
}
