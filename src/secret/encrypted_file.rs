//! Passphrase-sealed seed file.
//!
//! The mnemonic is encrypted with ChaCha20-Poly1305 under a key derived from
//! the user's passphrase with Argon2id. Reading and storing go through the
//! [`Authenticator`]; existence checks and deletion do not.

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::{Authenticator, RecoverySecret, SecretStore};
use crate::error::SecretError;

const SEALED_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// On-disk layout of the sealed secret.
#[derive(Debug, Serialize, Deserialize)]
struct SealedSecret {
    version: u32,
    /// Argon2 salt, hex encoded.
    salt: String,
    /// ChaCha20-Poly1305 nonce, hex encoded.
    nonce: String,
    /// Encrypted mnemonic, hex encoded.
    ciphertext: String,
}

fn derive_key(passphrase: &str, salt: &[u8], kdf: KdfParams) -> Result<[u8; 32]> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| anyhow!("Invalid Argon2 parameters: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| anyhow!("Key derivation failed: {e}"))?;
    Ok(key)
}

impl SealedSecret {
    fn seal(phrase: &str, passphrase: &str, kdf: KdfParams) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let key = derive_key(passphrase, &salt, kdf)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|_| anyhow!("Failed to create cipher"))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), phrase.as_bytes())
            .map_err(|_| anyhow!("Encryption failed"))?;

        Ok(Self {
            version: SEALED_VERSION,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        })
    }

    fn open(&self, passphrase: &str, kdf: KdfParams) -> Result<String, SecretError> {
        if self.version != SEALED_VERSION {
            return Err(SecretError::StorageRead(format!(
                "Unsupported seed file version: {} (expected {})",
                self.version, SEALED_VERSION
            )));
        }

        let corrupt = |what: &str| SecretError::StorageRead(format!("Invalid {what} in seed file"));
        let salt = hex::decode(&self.salt).map_err(|_| corrupt("salt"))?;
        let nonce_bytes = hex::decode(&self.nonce).map_err(|_| corrupt("nonce"))?;
        let ciphertext = hex::decode(&self.ciphertext).map_err(|_| corrupt("ciphertext"))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(corrupt("nonce length"));
        }

        let key =
            derive_key(passphrase, &salt, kdf).map_err(|e| SecretError::StorageRead(e.to_string()))?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|_| SecretError::StorageRead("Failed to create cipher".to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| SecretError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| corrupt("mnemonic encoding"))
    }
}

/// [`SecretStore`] keeping one sealed mnemonic in a file.
pub struct EncryptedFileSecretStore {
    path: PathBuf,
    auth: Arc<dyn Authenticator>,
    kdf: KdfParams,
}

impl EncryptedFileSecretStore {
    pub fn new(path: impl Into<PathBuf>, auth: Arc<dyn Authenticator>, kdf: KdfParams) -> Self {
        Self {
            path: path.into(),
            auth,
            kdf,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn authorize(&self, purpose: &str) -> Result<String, SecretError> {
        match self.auth.passphrase(purpose).await {
            Some(passphrase) => Ok(passphrase),
            None => {
                info!("Secure storage access declined ({purpose})");
                Err(SecretError::AuthenticationCancelled)
            }
        }
    }
}

fn read_err(err: impl std::fmt::Display) -> SecretError {
    SecretError::StorageRead(err.to_string())
}

fn write_err(err: impl std::fmt::Display) -> SecretError {
    SecretError::StorageWrite(err.to_string())
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(contents)?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

#[async_trait]
impl SecretStore for EncryptedFileSecretStore {
    async fn exists(&self) -> Result<bool, SecretError> {
        tokio::fs::try_exists(&self.path).await.map_err(read_err)
    }

    async fn read(&self) -> Result<RecoverySecret, SecretError> {
        if !self.exists().await? {
            return Err(SecretError::NotFound);
        }
        let passphrase = self.authorize("view seed phrase").await?;

        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SecretError::NotFound
            } else {
                read_err(e)
            }
        })?;
        let sealed: SealedSecret = serde_json::from_str(&json)
            .map_err(|e| read_err(format!("Failed to parse seed file: {e}")))?;

        let kdf = self.kdf;
        let phrase = tokio::task::spawn_blocking(move || sealed.open(&passphrase, kdf))
            .await
            .map_err(read_err)?
            .inspect_err(|e| warn!("Failed to open seed file: {e}"))?;

        Ok(RecoverySecret::new(phrase))
    }

    async fn delete(&self) -> Result<bool, SecretError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Seed file removed: {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(write_err(e)),
        }
    }

    async fn store(&self, secret: &RecoverySecret) -> Result<(), SecretError> {
        if self.exists().await? {
            return Err(SecretError::AlreadyExists);
        }
        let passphrase = self.authorize("protect seed phrase").await?;

        let phrase = secret.expose().to_string();
        let kdf = self.kdf;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let sealed = SealedSecret::seal(&phrase, &passphrase, kdf)?;
            let json = serde_json::to_string_pretty(&sealed)?;
            write_private(&path, json.as_bytes())
        })
        .await
        .map_err(write_err)?
        .map_err(|e| write_err(format!("{e:#}")))?;

        info!("Seed phrase stored ({} words)", secret.word_count());
        Ok(())
    }
}
