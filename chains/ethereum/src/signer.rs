//! Local-key signer: holds one `LocalWallet` per key handle and turns an
//! [`UnsignedTransfer`] into RLP-encoded, EIP-155 signed bytes.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use sweep_core::{EncryptedWalletStore, SignedTransfer, SignerError, UnsignedTransfer};

use crate::erc20;

pub struct LocalKeySigner {
    keys: HashMap<String, LocalWallet>,
    chain_id: u64,
}

impl LocalKeySigner {
    /// Build a signer from every record in the wallet store, verifying
    /// that each key actually controls its recorded address.
    pub fn from_store(store: &EncryptedWalletStore, chain_id: u64) -> Result<Self> {
        let mut signer = Self {
            keys: HashMap::new(),
            chain_id,
        };
        for record in store.records() {
            signer.insert_key(&record.address, &record.private_key)?;
        }
        Ok(signer)
    }

    /// Register an additional key, e.g. the funding wallet from the
    /// environment. The handle is matched case-insensitively.
    pub fn insert_key(&mut self, handle: &str, private_key: &str) -> Result<()> {
        let wallet: LocalWallet = private_key
            .trim_start_matches("0x")
            .parse()
            .with_context(|| format!("invalid private key for '{}'", handle))?;
        let wallet = wallet.with_chain_id(self.chain_id);

        // A handle that looks like an address must match the key.
        if handle.starts_with("0x") {
            let expected: Address = handle
                .parse()
                .with_context(|| format!("invalid address handle '{}'", handle))?;
            if wallet.address() != expected {
                anyhow::bail!(
                    "address mismatch for '{}': key controls {:?}",
                    handle,
                    wallet.address()
                );
            }
        }

        self.keys.insert(handle.to_lowercase(), wallet);
        Ok(())
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn typed_transaction(&self, tx: &UnsignedTransfer) -> Result<TypedTransaction> {
        let from: Address = tx.from.parse().context("invalid from address")?;
        let to: Address = tx.to.parse().context("invalid to address")?;

        let request = TransactionRequest::new()
            .from(from)
            .nonce(tx.nonce)
            .gas(tx.gas_limit)
            .gas_price(U256::from(tx.gas_price))
            .chain_id(tx.chain_id);

        let request = match &tx.token {
            Some(token) => {
                let token: Address = token.parse().context("invalid token address")?;
                let data = erc20::encode_transfer(to, U256::from(tx.value))?;
                request.to(token).value(0u64).data(data)
            }
            None => request.to(to).value(U256::from(tx.value)),
        };

        Ok(request.into())
    }
}

#[async_trait]
impl sweep_core::TransferSigner for LocalKeySigner {
    async fn sign(
        &self,
        tx: &UnsignedTransfer,
        key_handle: &str,
    ) -> Result<SignedTransfer, SignerError> {
        let wallet = self.keys.get(&key_handle.to_lowercase()).ok_or_else(|| {
            SignerError::UnknownKeyHandle {
                handle: key_handle.to_string(),
            }
        })?;

        let typed = self
            .typed_transaction(tx)
            .map_err(|e| SignerError::Failed {
                address: tx.from.clone(),
                reason: e.to_string(),
            })?;

        let signature = wallet
            .sign_transaction(&typed)
            .await
            .map_err(|e| SignerError::Failed {
                address: tx.from.clone(),
                reason: e.to_string(),
            })?;

        Ok(SignedTransfer {
            raw: typed.rlp_signed(&signature).to_vec(),
            transfer: tx.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_core::TransferSigner;

    // Well-known anvil/hardhat dev key 0; controls the address below.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn transfer(token: Option<&str>) -> UnsignedTransfer {
        UnsignedTransfer {
            from: DEV_ADDR.to_string(),
            to: "0xdd00000000000000000000000000000000000001".to_string(),
            value: 1_000_000,
            nonce: 4,
            gas_limit: 60_000,
            gas_price: 30_000_000_000,
            chain_id: 1,
            token: token.map(String::from),
        }
    }

    #[test]
    fn mismatched_handle_and_key_are_refused() {
        let mut signer = LocalKeySigner {
            keys: HashMap::new(),
            chain_id: 1,
        };
        let wrong = "0xdd00000000000000000000000000000000000001";
        assert!(signer.insert_key(wrong, DEV_KEY).is_err());
        assert!(signer.insert_key(DEV_ADDR, DEV_KEY).is_ok());
        assert_eq!(signer.key_count(), 1);
    }

    #[tokio::test]
    async fn unknown_handle_is_a_typed_error() {
        let signer = LocalKeySigner {
            keys: HashMap::new(),
            chain_id: 1,
        };
        match signer.sign(&transfer(None), "0xdead").await {
            Err(SignerError::UnknownKeyHandle { handle }) => assert_eq!(handle, "0xdead"),
            other => panic!("expected UnknownKeyHandle, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn signs_native_and_token_transfers() {
        let mut signer = LocalKeySigner {
            keys: HashMap::new(),
            chain_id: 1,
        };
        signer.insert_key(DEV_ADDR, DEV_KEY).unwrap();

        let native = signer.sign(&transfer(None), DEV_ADDR).await.unwrap();
        assert!(!native.raw.is_empty());
        assert_eq!(native.transfer.nonce, 4);

        let token = signer
            .sign(
                &transfer(Some("0xcc00000000000000000000000000000000000001")),
                // Handles match case-insensitively.
                &DEV_ADDR.to_uppercase().replace("0X", "0x"),
            )
            .await
            .unwrap();
        assert_ne!(token.raw, native.raw);
    }
}
