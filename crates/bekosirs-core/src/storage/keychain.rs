use keyring::Entry;
use tracing::debug;

use super::{CredentialKey, SecureStorage, StorageError};

/// Account name used for the startup capability probe.
const PROBE_ACCOUNT: &str = "bekosirs-probe";

/// OS keychain backend: one keyring entry per logical key.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Check that the keychain can actually store and return a secret.
    ///
    /// Headless hosts often expose a keychain API that fails on first use, so
    /// a write/read/delete cycle is the only reliable check.
    pub fn probe(service: &str) -> Result<(), StorageError> {
        let entry = Entry::new(service, PROBE_ACCOUNT)?;
        entry.set_password("probe")?;
        let read_back = entry.get_password()?;
        entry.delete_credential()?;
        if read_back != "probe" {
            return Err(StorageError::Corrupt);
        }
        debug!(service = service, "Keychain probe succeeded");
        Ok(())
    }

    fn entry(&self, key: CredentialKey) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key.as_str())?)
    }
}

impl SecureStorage for KeyringStorage {
    fn backend_name(&self) -> &'static str {
        "keychain"
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn get(&self, key: CredentialKey) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: CredentialKey) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
