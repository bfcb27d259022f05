//! Encrypted file backend.
//!
//! All keys live in one file so a batch of writes lands atomically:
//!
//! ```text
//! "BKS1" | salt (16) | nonce (12) | ChaCha20-Poly1305(JSON map)
//! ```
//!
//! The cipher key is derived with Argon2 from a random 32-byte install secret
//! kept in a sibling file. Both files are owner-only on unix.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use tracing::{debug, warn};

use super::{CredentialKey, SecureStorage, StorageError};

const CREDENTIALS_FILE: &str = "credentials.bin";
const SECRET_FILE: &str = "credentials.key";

const MAGIC: &[u8; 4] = b"BKS1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SECRET_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + NONCE_LEN;

// The input is a random 32-byte secret, not a password, so light parameters suffice.
const KDF_MEMORY_KIB: u32 = 4096;
const KDF_ITERATIONS: u32 = 1;

type CredentialMap = BTreeMap<String, String>;

pub struct FileStorage {
    path: PathBuf,
    secret_path: PathBuf,
    // Serialises read-modify-write cycles on the file.
    lock: Mutex<()>,
    // Cipher for the salt of the file last read or written.
    cipher_cache: Mutex<Option<([u8; SALT_LEN], ChaCha20Poly1305)>>,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            path: dir.join(CREDENTIALS_FILE),
            secret_path: dir.join(SECRET_FILE),
            lock: Mutex::new(()),
            cipher_cache: Mutex::new(None),
        }
    }

    fn secret(&self) -> Result<[u8; SECRET_LEN], StorageError> {
        if self.secret_path.exists() {
            let bytes = fs::read(&self.secret_path)?;
            return bytes.try_into().map_err(|_| StorageError::Corrupt);
        }

        let mut secret = [0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        write_private(&self.secret_path, &secret)?;
        debug!(path = %self.secret_path.display(), "Generated credential file secret");
        Ok(secret)
    }

    /// Argon2 runs once per file generation; reads of an unchanged file
    /// reuse the cached cipher.
    fn cipher(&self, salt: &[u8]) -> Result<ChaCha20Poly1305, StorageError> {
        let salt: [u8; SALT_LEN] = salt.try_into().map_err(|_| StorageError::Corrupt)?;
        let mut cache = self
            .cipher_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((cached_salt, cipher)) = cache.as_ref() {
            if *cached_salt == salt {
                return Ok(cipher.clone());
            }
        }

        let secret = self.secret()?;
        let mut key = [0u8; 32];
        let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, 1, Some(key.len()))
            .map_err(|e| StorageError::Crypto(e.to_string()))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(&secret, &salt, &mut key)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        *cache = Some((salt, cipher.clone()));
        Ok(cipher)
    }

    fn load(&self) -> Result<CredentialMap, StorageError> {
        if !self.path.exists() {
            return Ok(CredentialMap::new());
        }
        let sealed = fs::read(&self.path)?;
        if sealed.len() < HEADER_LEN || &sealed[..MAGIC.len()] != MAGIC {
            return Err(StorageError::Corrupt);
        }

        let salt = &sealed[MAGIC.len()..MAGIC.len() + SALT_LEN];
        let nonce = &sealed[MAGIC.len() + SALT_LEN..HEADER_LEN];
        let plaintext = self
            .cipher(salt)?
            .decrypt(Nonce::from_slice(nonce), &sealed[HEADER_LEN..])
            .map_err(|_| StorageError::Corrupt)?;

        serde_json::from_slice(&plaintext).map_err(|_| StorageError::Corrupt)
    }

    /// Load for a write cycle. An unreadable file is replaced rather than
    /// blocking every future write.
    fn load_for_write(&self) -> Result<CredentialMap, StorageError> {
        match self.load() {
            Err(StorageError::Corrupt) => {
                warn!(path = %self.path.display(), "Credential file unreadable, starting fresh");
                Ok(CredentialMap::new())
            }
            other => other,
        }
    }

    fn persist(&self, map: &CredentialMap) -> Result<(), StorageError> {
        let plaintext = serde_json::to_vec(map)?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher(&salt)?
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        sealed.extend_from_slice(MAGIC);
        sealed.extend_from_slice(&salt);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        let tmp = self.path.with_extension("bin.tmp");
        write_private(&tmp, &sealed)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // A panic mid-write leaves nothing in the guard worth protecting.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SecureStorage for FileStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), StorageError> {
        self.set_many(&[(key, value)])
    }

    fn get(&self, key: CredentialKey) -> Result<Option<String>, StorageError> {
        let _guard = self.guard();
        Ok(self.load()?.remove(key.as_str()))
    }

    fn delete(&self, key: CredentialKey) -> Result<(), StorageError> {
        self.delete_many(&[key])
    }

    fn set_many(&self, entries: &[(CredentialKey, &str)]) -> Result<(), StorageError> {
        let _guard = self.guard();
        let mut map = self.load_for_write()?;
        for (key, value) in entries {
            map.insert(key.as_str().to_string(), (*value).to_string());
        }
        self.persist(&map)
    }

    fn delete_many(&self, keys: &[CredentialKey]) -> Result<(), StorageError> {
        let _guard = self.guard();
        let mut map = self.load_for_write()?;
        let before = map.len();
        for key in keys {
            map.remove(key.as_str());
        }
        if map.len() == before && self.path.exists() {
            return Ok(());
        }
        self.persist(&map)
    }
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
