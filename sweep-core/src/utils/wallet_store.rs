use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::StoreError;
use crate::model::Wallet;
use crate::security::SecurityUtils;
use crate::traits::WalletStore;

/// One custodial wallet record as persisted on disk.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredWallet {
    pub address: String,
    pub private_key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl fmt::Debug for StoredWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredWallet")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("contact", &self.contact)
            .field("enabled", &self.enabled)
            .field("private_key", &"***REDACTED***")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct WalletFile {
    wallets: Vec<StoredWallet>,
}

/// File-backed wallet store. The file is either a plaintext JSON document
/// (`{"wallets": [...]}`) for development, or the same document sealed as
/// scrypt + AES-256-GCM components:
///
/// ```json
/// { "encrypted": { "ciphertext": "...", "iv": "...", "salt": "...", "tag": "..." } }
/// ```
///
/// Decrypted once at load; key material is zeroized when the store drops.
pub struct EncryptedWalletStore {
    path: PathBuf,
    records: Vec<StoredWallet>,
}

impl EncryptedWalletStore {
    /// Load and, if needed, decrypt the wallet file. A password is
    /// required whenever the file carries an `encrypted` block.
    pub fn load(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let display = path.display().to_string();

        if !path.exists() {
            return Err(StoreError::FileNotFound { path: display });
        }

        let content = fs::read_to_string(&path).map_err(|e| StoreError::IoError {
            path: display.clone(),
            msg: e.to_string(),
        })?;
        let json: Value =
            serde_json::from_str(&content).map_err(|e| StoreError::InvalidFormat {
                path: display.clone(),
                reason: e.to_string(),
            })?;

        let plaintext = if let Some(encrypted) = json.get("encrypted") {
            let pass = password.ok_or_else(|| StoreError::DecryptionFailed {
                path: display.clone(),
                reason: "password required for encrypted wallet file".into(),
            })?;
            let field = |name: &str| {
                encrypted
                    .get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            SecurityUtils::decrypt_components(
                &field("ciphertext"),
                &field("iv"),
                &field("salt"),
                &field("tag"),
                pass,
            )
            .map_err(|e| StoreError::DecryptionFailed {
                path: display.clone(),
                reason: e.to_string(),
            })?
        } else {
            content
        };

        let file: WalletFile =
            serde_json::from_str(&plaintext).map_err(|e| StoreError::InvalidFormat {
                path: display.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            path,
            records: file.wallets,
        })
    }

    /// Write `records` to `path`, sealed under `password`.
    pub fn save(
        path: impl AsRef<Path>,
        password: &str,
        records: &[StoredWallet],
    ) -> Result<(), StoreError> {
        let display = path.as_ref().display().to_string();
        let plaintext = serde_json::to_string(&WalletFile {
            wallets: records.to_vec(),
        })
        .map_err(|e| StoreError::InvalidFormat {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        let (ciphertext, iv, salt, tag) = SecurityUtils::encrypt_components(&plaintext, password)
            .map_err(|e| StoreError::DecryptionFailed {
                path: display.clone(),
                reason: e.to_string(),
            })?;

        let doc = serde_json::json!({
            "encrypted": {
                "ciphertext": ciphertext,
                "iv": iv,
                "salt": salt,
                "tag": tag,
            }
        });

        let pretty = serde_json::to_string_pretty(&doc).map_err(|e| StoreError::InvalidFormat {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        fs::write(path.as_ref(), pretty).map_err(|e| StoreError::IoError {
            path: display,
            msg: e.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Private key for a key handle. Handles are the record addresses,
    /// matched case-insensitively.
    pub fn key_for(&self, handle: &str) -> Result<String, StoreError> {
        self.records
            .iter()
            .find(|r| r.address.eq_ignore_ascii_case(handle))
            .map(|r| r.private_key.clone())
            .ok_or_else(|| StoreError::UnknownHandle {
                handle: handle.to_string(),
            })
    }

    /// All records, including disabled ones; used by the debug tooling.
    pub fn records(&self) -> &[StoredWallet] {
        &self.records
    }
}

#[async_trait]
impl WalletStore for EncryptedWalletStore {
    async fn list_enabled(&self) -> Result<Vec<Wallet>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.enabled)
            .map(|r| Wallet {
                address: r.address.clone(),
                key_handle: r.address.clone(),
                name: r.name.clone(),
                contact: r.contact.clone(),
                enabled: r.enabled,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_records() -> Vec<StoredWallet> {
        vec![
            StoredWallet {
                address: "0xAA00000000000000000000000000000000000001".into(),
                private_key: "0x01".into(),
                name: "User1".into(),
                contact: "user1@example.com".into(),
                enabled: true,
            },
            StoredWallet {
                address: "0xAA00000000000000000000000000000000000002".into(),
                private_key: "0x02".into(),
                name: "User2".into(),
                contact: "user2@example.com".into(),
                enabled: false,
            },
        ]
    }

    #[tokio::test]
    async fn encrypted_roundtrip_and_enabled_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallets.enc");

        EncryptedWalletStore::save(&path, "hunter2", &sample_records()).unwrap();
        let store = EncryptedWalletStore::load(&path, Some("hunter2")).unwrap();

        assert_eq!(store.count(), 2);
        let enabled = store.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "User1");
        assert_eq!(enabled[0].key_handle, enabled[0].address);
    }

    #[tokio::test]
    async fn wrong_password_is_a_decryption_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallets.enc");
        EncryptedWalletStore::save(&path, "correct", &sample_records()).unwrap();

        match EncryptedWalletStore::load(&path, Some("wrong")) {
            Err(StoreError::DecryptionFailed { .. }) => {}
            other => panic!("expected DecryptionFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn plaintext_file_loads_without_password() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let doc = serde_json::json!({
            "wallets": [
                { "address": "0xAA00000000000000000000000000000000000003", "private_key": "0x03" }
            ]
        });
        fs::write(&path, doc.to_string()).unwrap();

        let store = EncryptedWalletStore::load(&path, None).unwrap();
        let enabled = store.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
    }

    #[test]
    fn key_lookup_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallets.enc");
        EncryptedWalletStore::save(&path, "pw", &sample_records()).unwrap();
        let store = EncryptedWalletStore::load(&path, Some("pw")).unwrap();

        let key = store
            .key_for("0xaa00000000000000000000000000000000000001")
            .unwrap();
        assert_eq!(key, "0x01");
        assert!(store.key_for("0xdead").is_err());
    }

    #[test]
    fn debug_output_redacts_keys() {
        let record = &sample_records()[0];
        let rendered = format!("{:?}", record);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("0x01"));
    }
}
