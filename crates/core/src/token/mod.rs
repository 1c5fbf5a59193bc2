//! Opaque client-facing tokens for attachment hashes.
//!
//! A token is `base64url(nonce || ciphertext)` where the ciphertext is the
//! hash sealed with XChaCha20-Poly1305. Tokens are reversible only with the
//! server key, and any tampering fails authentication on decode.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// XChaCha20-Poly1305 nonce size in bytes.
const NONCE_SIZE: usize = 24;

/// Token codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Sealing the hash failed.
    #[error("token encoding failed")]
    EncodeFailed,

    /// The token is not a valid sealed hash.
    #[error("token could not be decoded")]
    DecodeFailed,
}

/// Reversible mapping between internal hashes and client tokens.
pub trait TokenCodec: Send + Sync {
    /// Encode a hash into an opaque token.
    fn encode(&self, hash: &str) -> Result<String, TokenError>;

    /// Decode a token back into its hash.
    fn decode(&self, token: &str) -> Result<String, TokenError>;
}

/// Token codec sealing hashes with a server-side key.
#[derive(Clone)]
pub struct SealedTokenCodec {
    key: [u8; 32],
}

impl SealedTokenCodec {
    /// Derive the codec key from a configured secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"chatdrop.token.v1");
        hasher.update(secret.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }
}

impl std::fmt::Debug for SealedTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedTokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec for SealedTokenCodec {
    fn encode(&self, hash: &str) -> Result<String, TokenError> {
        let cipher = XChaCha20Poly1305::new((&self.key).into());
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, hash.as_bytes())
            .map_err(|_| TokenError::EncodeFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(base64_url::encode(&sealed))
    }

    fn decode(&self, token: &str) -> Result<String, TokenError> {
        let sealed = base64_url::decode(token).map_err(|_| TokenError::DecodeFailed)?;
        if sealed.len() <= NONCE_SIZE {
            return Err(TokenError::DecodeFailed);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let cipher = XChaCha20Poly1305::new((&self.key).into());
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| TokenError::DecodeFailed)?;

        String::from_utf8(plaintext).map_err(|_| TokenError::DecodeFailed)
    }
}
