use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption key must be 32 bytes, base64url encoded")]
    InvalidKey,
    #[error("token could not be encrypted")]
    Encryption,
    #[error("stored token is corrupted or was encrypted with a different key")]
    Decryption,
}

/// AES-256-GCM codec for OAuth tokens at rest.
///
/// Output layout is `base64url(nonce || ciphertext || tag)` with a fresh
/// 96-bit nonce per encryption. Decryption fails closed: a malformed blob or
/// a tag mismatch yields `CipherError::Decryption`, never garbage plaintext.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(key_b64: &str) -> Result<Self, CipherError> {
        let key_bytes = URL_SAFE_NO_PAD
            .decode(key_b64.trim_end_matches('='))
            .map_err(|_| CipherError::InvalidKey)?;
        if key_bytes.len() != 32 {
            return Err(CipherError::InvalidKey);
        }

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String, CipherError> {
        let blob = URL_SAFE_NO_PAD
            .decode(encrypted)
            .map_err(|_| CipherError::Decryption)?;
        if blob.len() <= NONCE_LEN {
            return Err(CipherError::Decryption);
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CipherError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

    fn test_key() -> String {
        URL_SAFE_NO_PAD.encode([7u8; 32])
    }

    #[test]
    fn test_round_trip() {
        let cipher = TokenCipher::new(&test_key()).unwrap();
        let token = "very-secret-access-token";

        let encrypted = cipher.encrypt(token).unwrap();
        assert_ne!(encrypted, token);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), token);
    }

    #[test]
    fn test_each_encryption_uses_fresh_nonce() {
        let cipher = TokenCipher::new(&test_key()).unwrap();
        assert_ne!(
            cipher.encrypt("token").unwrap(),
            cipher.encrypt("token").unwrap()
        );
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let cipher = TokenCipher::new(&test_key()).unwrap();
        assert!(matches!(
            cipher.decrypt("not-a-ciphertext"),
            Err(CipherError::Decryption)
        ));
    }

    #[test]
    fn test_decrypt_rejects_tampered_ciphertext() {
        let cipher = TokenCipher::new(&test_key()).unwrap();
        let mut encrypted = cipher.encrypt("token").unwrap().into_bytes();
        let last = encrypted.len() - 1;
        encrypted[last] = if encrypted[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(encrypted).unwrap();

        assert!(matches!(
            cipher.decrypt(&tampered),
            Err(CipherError::Decryption)
        ));
    }

    #[test]
    fn test_decrypt_rejects_wrong_key() {
        let cipher = TokenCipher::new(&test_key()).unwrap();
        let other = TokenCipher::new(&URL_SAFE_NO_PAD.encode([9u8; 32])).unwrap();

        let encrypted = cipher.encrypt("token").unwrap();
        assert!(matches!(
            other.decrypt(&encrypted),
            Err(CipherError::Decryption)
        ));
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(matches!(
            TokenCipher::new(&URL_SAFE_NO_PAD.encode([1u8; 16])),
            Err(CipherError::InvalidKey)
        ));
    }
}
