use base64::{Engine as _, engine::general_purpose};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce
};
use serde_derive::{Serialize, Deserialize};

use crate::errors::AppError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncryptedData {
    pub nonce: String,
    pub data: String,
}

#[derive(Clone)]
pub struct Encryptor {
    cipher: XChaCha20Poly1305,
}

impl Encryptor {
    pub fn new(key: &[u8]) -> Result<Encryptor, AppError> {
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| AppError::Config(format!("encryption key must be 32 bytes, got {}", key.len())))?;

        Ok(Encryptor { cipher })
    }

    /// Builds an encryptor from a base64 encoded 32 byte key, padded or not.
    pub fn from_base64(key_base64: &str) -> Result<Encryptor, AppError> {
        let trimmed = key_base64.trim().trim_end_matches('=');
        let key = general_purpose::STANDARD_NO_PAD.decode(trimmed)?;
        Self::new(&key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedData, AppError> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng); // 192-bits; unique per message
        let ciphertext = self.cipher.encrypt(&nonce, plaintext.as_bytes())?;

        Ok(EncryptedData {
            nonce: general_purpose::STANDARD_NO_PAD.encode(nonce.as_slice()),
            data: general_purpose::STANDARD_NO_PAD.encode(&ciphertext),
        })
    }

    pub fn decrypt(&self, encrypted_data: &EncryptedData) -> Result<String, AppError> {
        let nonce_bytes = general_purpose::STANDARD_NO_PAD.decode(&encrypted_data.nonce)?;
        let encrypted = general_purpose::STANDARD_NO_PAD.decode(&encrypted_data.data)?;

        if nonce_bytes.len() != 24 {
            return Err(AppError::UnexpectedError(format!("invalid nonce length {}", nonce_bytes.len())));
        }

        let nonce = XNonce::from_slice(nonce_bytes.as_slice());
        let plaintext = self.cipher.decrypt(nonce, encrypted.as_slice())?;

        String::from_utf8(plaintext)
            .map_err(|err| AppError::UnexpectedError(format!("decrypted value is not UTF-8: {}", err)))
    }
}
