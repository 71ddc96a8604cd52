//! AES-256-GCM envelope encryption
//!
//! Every payload is sealed on its own with a fresh 96-bit nonce drawn from the
//! OS random source. Callers never choose a nonce.
//!
//! Serialized form: `{"ciphertext": base64, "nonce": base64}`; the 16-byte
//! GCM tag stays appended to the ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{MasterKey, SecretString};
use crate::error::{Result, VaultError};

/// Nonce length for AES-GCM (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Authentication tag length appended by AES-GCM
pub const TAG_LEN: usize = 16;

/// One sealed payload: ciphertext (with tag) and the nonce it was sealed under
///
/// The two halves only ever travel together; there is no way to replace one
/// without the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    #[serde(with = "base64_bytes")]
    ciphertext: Vec<u8>,
    #[serde(with = "base64_nonce")]
    nonce: [u8; NONCE_LEN],
}

impl SealedPayload {
    /// Reassemble a payload from stored parts
    pub fn from_parts(ciphertext: Vec<u8>, nonce: [u8; NONCE_LEN]) -> Self {
        Self { ciphertext, nonce }
    }

    /// Ciphertext including the authentication tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Nonce used for this payload
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }
}

/// Seal plaintext under `key` with a fresh random nonce
pub fn seal(plaintext: &[u8], key: &MasterKey) -> Result<SealedPayload> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Configuration(format!("invalid key: {}", e)))?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| VaultError::Configuration(format!("encryption failed: {}", e)))?;

    Ok(SealedPayload { ciphertext, nonce })
}

/// Open a sealed payload
///
/// Fails closed with [`VaultError::Authentication`] on a wrong key, a
/// modified ciphertext or nonce, or truncated input.
pub fn open(sealed: &SealedPayload, key: &MasterKey) -> Result<Vec<u8>> {
    if sealed.ciphertext.len() < TAG_LEN {
        return Err(VaultError::Authentication);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| VaultError::Authentication)?;

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| VaultError::Authentication)
}

/// Seal a UTF-8 string
pub fn seal_string(plaintext: &str, key: &MasterKey) -> Result<SealedPayload> {
    seal(plaintext.as_bytes(), key)
}

/// Open a payload that holds UTF-8 text
pub fn open_string(sealed: &SealedPayload, key: &MasterKey) -> Result<SecretString> {
    let plaintext = open(sealed, key)?;
    match String::from_utf8(plaintext) {
        Ok(text) => Ok(SecretString::new(text)),
        Err(e) => {
            let mut bytes = e.into_bytes();
            zeroize::Zeroize::zeroize(&mut bytes);
            Err(VaultError::Authentication)
        }
    }
}

pub(crate) fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn decode(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        decode(&text).map_err(serde::de::Error::custom)
    }
}

mod base64_nonce {
    use super::*;

    pub fn serialize<S: Serializer>(
        nonce: &[u8; NONCE_LEN],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(nonce))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<[u8; NONCE_LEN], D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = decode(&text).map_err(serde::de::Error::custom)?;
        bytes.as_slice().try_into().map_err(|_| {
            serde::de::Error::custom(format!(
                "nonce must be {} bytes, got {}",
                NONCE_LEN,
                bytes.len()
            ))
        })
    }
}
