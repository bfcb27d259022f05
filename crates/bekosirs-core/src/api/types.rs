//! Request and response bodies for the authentication endpoints.

use serde::{Deserialize, Serialize};

// ===== Token endpoints =====

#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub platform: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// `refresh` is present when the backend rotates refresh tokens.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

// ===== Biometric endpoints =====

#[derive(Debug, Serialize)]
pub struct BiometricEnableRequest<'a> {
    pub device_id: &'a str,
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct BiometricEnableResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub biometric_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct BiometricDisableResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub biometric_enabled: bool,
}

/// Server-side view of the biometric binding for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BiometricStatus {
    pub biometric_enabled: bool,
    pub has_device: bool,
}

#[derive(Debug, Serialize)]
pub struct VerifyDeviceRequest<'a> {
    pub user_id: i64,
    pub device_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct VerifyDeviceResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ===== Accounts =====

/// Account registration input, as collected by the sign-up form.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterBody<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredUser {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET profile/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Profile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        match (first.is_empty(), last.is_empty()) {
            (true, true) => self.username.clone(),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (false, false) => format!("{} {}", first, last),
        }
    }
}

// ===== Password reset =====

#[derive(Debug, Serialize)]
pub struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetConfirm<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
    pub confirm_password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_response() {
        let json = r#"{"refresh": "r-1", "access": "a-1", "role": "customer", "username": "ayse"}"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.access, "a-1");
        assert_eq!(resp.refresh, "r-1");
        assert_eq!(resp.role.as_deref(), Some("customer"));
    }

    #[test]
    fn test_parse_refresh_without_rotation() {
        let resp: RefreshResponse = serde_json::from_str(r#"{"access": "a-2"}"#).unwrap();
        assert_eq!(resp.access, "a-2");
        assert!(resp.refresh.is_none());
    }

    #[test]
    fn test_register_body_omits_missing_phone() {
        let body = RegisterBody {
            username: "ayse",
            email: "ayse@example.com",
            password: "pw",
            first_name: "Ayse",
            last_name: "Yilmaz",
            role: "customer",
            phone_number: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("phone_number").is_none());
        assert_eq!(value["role"], "customer");
    }

    #[test]
    fn test_parse_verify_rejection() {
        let json = r#"{"success": false, "error": "Device not authorised"}"#;
        let resp: VerifyDeviceResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Device not authorised"));
    }

    #[test]
    fn test_profile_display_name() {
        let mut profile: Profile =
            serde_json::from_str(r#"{"id": 3, "username": "mehmet", "role": "customer"}"#).unwrap();
        assert_eq!(profile.display_name(), "mehmet");

        profile.first_name = Some("Mehmet".to_string());
        profile.last_name = Some("Kaya".to_string());
        assert_eq!(profile.display_name(), "Mehmet Kaya");
    }
}
