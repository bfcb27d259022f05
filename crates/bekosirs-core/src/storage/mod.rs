//! Secure credential persistence.
//!
//! This module provides:
//! - `SecureStorage`: the key-value contract over the five logical credential keys
//! - `KeyringStorage`: OS keychain backend via the `keyring` crate
//! - `FileStorage`: encrypted single-file fallback for hosts without a keychain
//! - `CredentialStore`: the typed view every other component talks to
//!
//! The backend is chosen once by [`CredentialStore::open`]; callers never
//! branch on it.

pub mod file;
pub mod keychain;
pub mod store;

use thiserror::Error;

pub use file::FileStorage;
pub use keychain::KeyringStorage;
pub use store::{BiometricRegistration, CredentialStore};

/// Logical keys held in secure storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    BiometricUserId,
    BiometricRefreshToken,
    BiometricDeviceId,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 5] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::BiometricUserId,
        CredentialKey::BiometricRefreshToken,
        CredentialKey::BiometricDeviceId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "access_token",
            CredentialKey::RefreshToken => "refresh_token",
            CredentialKey::BiometricUserId => "biometric_user_id",
            CredentialKey::BiometricRefreshToken => "biometric_refresh_token",
            CredentialKey::BiometricDeviceId => "biometric_device_id",
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("Credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential file is corrupt or was sealed with a different secret")]
    Corrupt,

    #[error("Credential encryption failed: {0}")]
    Crypto(String),

    #[error("Failed to encode credentials: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Key-value contract implemented by each storage backend.
///
/// Deleting an absent key is not an error.
pub trait SecureStorage: Send + Sync {
    /// Short name for logs.
    fn backend_name(&self) -> &'static str;

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StorageError>;

    fn get(&self, key: CredentialKey) -> Result<Option<String>, StorageError>;

    fn delete(&self, key: CredentialKey) -> Result<(), StorageError>;

    /// Write several keys. Backends that can replace all entries in one
    /// operation override this.
    fn set_many(&self, entries: &[(CredentialKey, &str)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(*key, value)?;
        }
        Ok(())
    }

    /// Delete several keys. Every key is attempted; the first failure is returned.
    fn delete_many(&self, keys: &[CredentialKey]) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.delete(*key) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
