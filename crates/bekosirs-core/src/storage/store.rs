use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{CredentialKey, FileStorage, KeyringStorage, SecureStorage, StorageError};
use crate::config::{Config, StoragePreference};

const BIOMETRIC_KEYS: [CredentialKey; 2] = [
    CredentialKey::BiometricUserId,
    CredentialKey::BiometricRefreshToken,
];

/// A complete biometric registration. Only ever built when all three
/// fields are present in storage.
#[derive(Clone, PartialEq, Eq)]
pub struct BiometricRegistration {
    pub user_id: i64,
    pub device_id: String,
    pub refresh_token: String,
}

impl fmt::Debug for BiometricRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BiometricRegistration")
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Typed view over the selected storage backend.
///
/// Reads degrade to "absent" on backend failure; writes propagate.
/// Clone is cheap and shares the backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecureStorage>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn SecureStorage>) -> Self {
        Self { backend }
    }

    /// Select the backend once, according to the configured preference.
    pub fn open(config: &Config) -> Result<Self> {
        let backend: Arc<dyn SecureStorage> = match config.storage {
            StoragePreference::Keyring => Arc::new(KeyringStorage::new(&config.keyring_service)),
            StoragePreference::File => Arc::new(FileStorage::new(config.data_dir()?)),
            StoragePreference::Auto => match KeyringStorage::probe(&config.keyring_service) {
                Ok(()) => Arc::new(KeyringStorage::new(&config.keyring_service)),
                Err(e) => {
                    let dir = config
                        .data_dir()
                        .context("Keychain unavailable and no data directory for the file store")?;
                    warn!(error = %e, dir = %dir.display(), "Keychain unavailable, using encrypted file store");
                    Arc::new(FileStorage::new(dir))
                }
            },
        };
        info!(backend = backend.backend_name(), "Credential store ready");
        Ok(Self::new(backend))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    fn read(&self, key: CredentialKey) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "Credential read failed, treating as absent");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(CredentialKey::AccessToken)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(CredentialKey::RefreshToken)
    }

    /// The derived session flag: an access token is present.
    pub fn has_session(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn save_tokens(&self, access: &str, refresh: &str) -> Result<(), StorageError> {
        self.backend.set_many(&[
            (CredentialKey::AccessToken, access),
            (CredentialKey::RefreshToken, refresh),
        ])?;
        debug!("Stored access and refresh tokens");
        Ok(())
    }

    /// Store the result of a refresh exchange. A rotated refresh token
    /// replaces the plain copy and, when one exists, the biometric mirror.
    ///
    /// The mirror is written first so a failing backend never leaves it older
    /// than the plain copy. On failure the previous values are restored.
    pub fn rotate_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), StorageError> {
        let mut entries = Vec::with_capacity(3);
        if let Some(refresh) = refresh {
            if self.read(CredentialKey::BiometricRefreshToken).is_some() {
                entries.push((CredentialKey::BiometricRefreshToken, refresh));
            }
            entries.push((CredentialKey::RefreshToken, refresh));
        }
        entries.push((CredentialKey::AccessToken, access));

        let previous = entries
            .iter()
            .map(|(key, _)| Ok((*key, self.backend.get(*key)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        if let Err(e) = self.backend.set_many(&entries) {
            warn!(error = %e, "Token rotation failed, restoring previous tokens");
            self.restore(&previous);
            return Err(e);
        }
        debug!(rotated = refresh.is_some(), "Stored refreshed tokens");
        Ok(())
    }

    fn restore(&self, previous: &[(CredentialKey, Option<String>)]) {
        for (key, value) in previous {
            let result = match value {
                Some(value) => self.backend.set(*key, value),
                None => self.backend.delete(*key),
            };
            if let Err(e) = result {
                warn!(key = key.as_str(), error = %e, "Failed to restore credential");
            }
        }
    }

    pub fn clear_tokens(&self) -> Result<(), StorageError> {
        self.backend
            .delete_many(&[CredentialKey::AccessToken, CredentialKey::RefreshToken])
    }

    pub fn device_id(&self) -> Option<String> {
        self.read(CredentialKey::BiometricDeviceId)
    }

    /// The registration, if every field is present and well-formed.
    pub fn biometric_registration(&self) -> Option<BiometricRegistration> {
        let user_id = self.read(CredentialKey::BiometricUserId)?.parse().ok()?;
        let refresh_token = self.read(CredentialKey::BiometricRefreshToken)?;
        let device_id = self.device_id()?;
        Some(BiometricRegistration {
            user_id,
            device_id,
            refresh_token,
        })
    }

    /// True when any registration field other than the device id is present.
    pub fn has_biometric_residue(&self) -> bool {
        BIOMETRIC_KEYS.iter().any(|key| self.read(*key).is_some())
    }

    /// Persist a registration as one unit. If the backend fails part way,
    /// whatever was written is removed again.
    pub fn save_biometric_registration(
        &self,
        user_id: i64,
        device_id: &str,
        refresh_token: &str,
    ) -> Result<(), StorageError> {
        let user_id = user_id.to_string();
        let result = self.backend.set_many(&[
            (CredentialKey::BiometricDeviceId, device_id),
            (CredentialKey::BiometricUserId, &user_id),
            (CredentialKey::BiometricRefreshToken, refresh_token),
        ]);

        if let Err(e) = result {
            if let Err(rollback) = self.clear_biometric_registration() {
                warn!(error = %rollback, "Failed to roll back partial biometric registration");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove the user id and refresh token mirror. The device id is kept so
    /// it stays stable for the install.
    pub fn clear_biometric_registration(&self) -> Result<(), StorageError> {
        self.backend.delete_many(&BIOMETRIC_KEYS)
    }
}
