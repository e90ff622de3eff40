use std::fs;
use std::path::PathBuf;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::WalletConfig;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;
const PBKDF2_ROUNDS: u32 = 100_000;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wallet blob truncated")]
    Truncated,
    #[error("wallet decryption failed (wrong passphrase or corrupt blob)")]
    Decrypt,
    #[error("wallet encryption failed")]
    Encrypt,
    #[error("wallet contents malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletChannel {
    pub peer: String,
    pub capacity_sat: u64,
}

/// Decrypted wallet contents. Built per request and dropped with it; nothing
/// decrypted is cached or written back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletSnapshot {
    pub balance: u64,
    pub channels: Vec<WalletChannel>,
}

/// On-disk encrypted wallet: `salt[16] || nonce[12] || AES-256-GCM ciphertext`
/// of a JSON `WalletSnapshot`, key derived with PBKDF2-HMAC-SHA256.
/// Read-only from the server's perspective; `seal_snapshot` exists for the
/// `wallet init` CLI and tests.
pub struct WalletVault {
    path: PathBuf,
    passphrase: String,
}

impl WalletVault {
    pub fn new(config: &WalletConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            passphrase: config.passphrase.clone(),
        }
    }

    pub fn open_snapshot(&self) -> Result<WalletSnapshot, WalletError> {
        let blob = fs::read(&self.path)?;
        if blob.len() < SALT_LEN + NONCE_LEN + GCM_TAG_LEN {
            return Err(WalletError::Truncated);
        }

        let (salt, rest) = blob.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let key = derive_key(&self.passphrase, salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| WalletError::Decrypt)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn seal_snapshot(&self, snapshot: &WalletSnapshot) -> Result<(), WalletError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut nonce);

        let key = derive_key(&self.passphrase, &salt);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = serde_json::to_vec(snapshot)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| WalletError::Encrypt)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(fs::write(&self.path, blob)?)
    }

    /// Simulated lightning payment: proves the wallet decrypts, moves no
    /// funds, leaves the blob untouched.
    pub fn pay(&self, invoice: &str) -> Result<String, WalletError> {
        let snapshot = self.open_snapshot()?;
        Ok(format!(
            "Simulated payment of invoice {} ({} sats available across {} channels); no funds moved",
            invoice,
            snapshot.balance,
            snapshot.channels.len()
        ))
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalletConfig;

    fn vault(path: &std::path::Path, passphrase: &str) -> WalletVault {
        WalletVault::new(&WalletConfig {
            path: path.to_string_lossy().into_owned(),
            passphrase: passphrase.to_string(),
        })
    }

    fn sample() -> WalletSnapshot {
        WalletSnapshot {
            balance: 21_000,
            channels: vec![WalletChannel {
                peer: "02abcdef".to_string(),
                capacity_sat: 500_000,
            }],
        }
    }

    #[test]
    fn seal_then_open_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.bin");
        let vault = vault(&path, "correct horse");
        vault.seal_snapshot(&sample()).unwrap();
        assert_eq!(vault.open_snapshot().unwrap(), sample());
    }

    #[test]
    fn wrong_passphrase_fails_without_partial_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.bin");
        vault(&path, "right").seal_snapshot(&sample()).unwrap();

        let err = vault(&path, "wrong").open_snapshot().err().unwrap();
        assert!(matches!(err, WalletError::Decrypt));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.bin");
        fs::write(&path, [0u8; 10]).unwrap();

        let err = vault(&path, "x").open_snapshot().err().unwrap();
        assert!(matches!(err, WalletError::Truncated));
    }

    #[test]
    fn pay_describes_a_simulated_payment_and_keeps_the_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.bin");
        let vault = vault(&path, "pw");
        vault.seal_snapshot(&sample()).unwrap();
        let before = fs::read(&path).unwrap();

        let result = vault.pay("lnbc1ptest").unwrap();
        assert!(result.contains("lnbc1ptest"));
        assert!(result.contains("21000 sats"));
        assert_eq!(fs::read(&path).unwrap(), before);
    }
}
