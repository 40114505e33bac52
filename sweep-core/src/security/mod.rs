use aes_gcm::{
    aead::{Aead, NewAead},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use rand::RngCore;

pub struct SecurityUtils;

impl SecurityUtils {
    const TAG_LEN: usize = 16;

    fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
        // scrypt N=16384 (log_n 14), r=8, p=1
        let params = scrypt::Params::new(14, 8, 1, 32)
            .map_err(|e| anyhow::anyhow!("Invalid scrypt params: {}", e))?;
        let mut key = [0u8; 32];
        scrypt::scrypt(password.as_bytes(), salt, &params, &mut key)
            .map_err(|e| anyhow::anyhow!("Scrypt failed: {}", e))?;
        Ok(key)
    }

    /// Encrypt `plaintext` under a scrypt-derived AES-256-GCM key.
    /// Returns hex-encoded (ciphertext, iv, salt, tag) components.
    pub fn encrypt_components(
        plaintext: &str,
        password: &str,
    ) -> Result<(String, String, String, String)> {
        let mut salt = [0u8; 16];
        let mut iv = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut iv);

        let key = Self::derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new(&key.into());
        let nonce = Nonce::from_slice(&iv);

        let mut sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        // aes-gcm appends the tag; split it off so the stored format
        // carries it as a separate component.
        let tag = sealed.split_off(sealed.len() - Self::TAG_LEN);

        Ok((
            hex::encode(sealed),
            hex::encode(iv),
            hex::encode(salt),
            hex::encode(tag),
        ))
    }

    /// Decrypt hex-encoded components produced by [`Self::encrypt_components`].
    pub fn decrypt_components(
        ciphertext_hex: &str,
        iv_hex: &str,
        salt_hex: &str,
        tag_hex: &str,
        password: &str,
    ) -> Result<String> {
        let ciphertext = hex::decode(ciphertext_hex).context("Invalid ciphertext hex")?;
        let iv = hex::decode(iv_hex).context("Invalid IV hex")?;
        let salt = hex::decode(salt_hex).context("Invalid salt hex")?;
        let mut tag = hex::decode(tag_hex).context("Invalid tag hex")?;

        let key = Self::derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new(&key.into());
        let nonce = Nonce::from_slice(&iv);

        let mut payload = ciphertext;
        payload.append(&mut tag);

        let plaintext = cipher
            .decrypt(nonce, payload.as_ref())
            .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

        let text = String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")?;
        Ok(text)
    }
}
