//! AES-256-GCM encryption of token bundles stored at rest.
//!
//! Ciphertext layout is `base64(nonce || ciphertext)` with a random 12-byte
//! nonce. Keys are 32 bytes supplied as 64 hex characters.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;

use super::Tokens;
use crate::error::{storage_error, Error, ErrorKind, StorageErrorKind};

const NONCE_SIZE: usize = 12;

/// Cipher bound to one validated key.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    pub fn new(key_hex: &str) -> Result<Self, Error> {
        let key = parse_key(key_hex)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| {
            storage_error(StorageErrorKind::EncryptionFailed, "invalid key length")
        })?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| storage_error(StorageErrorKind::EncryptionFailed, "encrypt failed"))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);

        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String, Error> {
        let combined = BASE64.decode(ciphertext_b64).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Storage(StorageErrorKind::DecryptionFailed),
        })?;

        if combined.len() < NONCE_SIZE {
            return Err(storage_error(
                StorageErrorKind::DecryptionFailed,
                "ciphertext shorter than nonce",
            ));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext_bytes = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                storage_error(StorageErrorKind::DecryptionFailed, "authentication failed")
            })?;

        String::from_utf8(plaintext_bytes).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Storage(StorageErrorKind::DecryptionFailed),
        })
    }

    /// Serializes and encrypts a token bundle.
    pub fn seal(&self, tokens: &Tokens) -> Result<String, Error> {
        self.encrypt(&tokens.to_json()?)
    }

    /// Decrypts and parses a token bundle written by [`TokenCipher::seal`].
    pub fn open(&self, ciphertext_b64: &str) -> Result<Tokens, Error> {
        Tokens::from_json(&self.decrypt(ciphertext_b64)?)
    }
}

fn parse_key(key_hex: &str) -> Result<[u8; 32], Error> {
    let bytes = hex::decode(key_hex).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: ErrorKind::Storage(StorageErrorKind::EncryptionFailed),
    })?;
    if bytes.len() != 32 {
        return Err(storage_error(
            StorageErrorKind::EncryptionFailed,
            "encryption key must be 32 bytes",
        ));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
