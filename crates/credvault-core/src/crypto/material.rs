//! Persisted master-key material and passphrase verification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encryption::{self, SealedPayload};
use super::key_derivation::{derive_key, generate_salt, KeyDerivationParams, SALT_LEN};
use super::MasterKey;
use crate::error::{Result, VaultError};

/// Known plaintext sealed once at setup
const CANARY_PLAINTEXT: &[u8] = b"credvault-canary-v1";

/// Salt, KDF parameters and canary for a vault
///
/// Written exactly once, when the vault is set up. Regenerating it would make
/// every stored ciphertext unreadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterKeyMaterial {
    #[serde(with = "salt_base64")]
    salt: [u8; SALT_LEN],
    kdf: KeyDerivationParams,
    canary: SealedPayload,
    created_at: DateTime<Utc>,
}

impl MasterKeyMaterial {
    /// Create material for a brand-new vault
    ///
    /// Returns the material to persist and the derived key for the session.
    pub fn create(passphrase: &str, params: KeyDerivationParams) -> Result<(Self, MasterKey)> {
        let salt = generate_salt();
        let key = derive_key(passphrase, &salt, &params)?;
        let canary = encryption::seal(CANARY_PLAINTEXT, &key)?;

        let material = Self {
            salt,
            kdf: params,
            canary,
            created_at: Utc::now(),
        };

        Ok((material, key))
    }

    /// Check a passphrase against the canary
    ///
    /// Derivation alone proves nothing: every passphrase yields a key. Only
    /// a successful open of the canary that returns the expected plaintext
    /// counts as a match.
    pub fn verify(&self, passphrase: &str) -> Result<bool> {
        let key = self.derive(passphrase)?;
        Ok(self.canary_matches(&key))
    }

    /// Derive and return the key if the passphrase is correct
    pub fn unlock(&self, passphrase: &str) -> Result<MasterKey> {
        let key = self.derive(passphrase)?;
        if self.canary_matches(&key) {
            Ok(key)
        } else {
            Err(VaultError::InvalidPassphrase)
        }
    }

    /// Key-derivation parameters baked into this vault
    pub fn kdf_params(&self) -> &KeyDerivationParams {
        &self.kdf
    }

    /// Salt used for key derivation
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    fn derive(&self, passphrase: &str) -> Result<MasterKey> {
        derive_key(passphrase, &self.salt, &self.kdf)
    }

    fn canary_matches(&self, key: &MasterKey) -> bool {
        match encryption::open(&self.canary, key) {
            Ok(plaintext) => plaintext == CANARY_PLAINTEXT,
            Err(_) => {
                debug!("Canary did not open with the derived key");
                false
            }
        }
    }
}

mod salt_base64 {
    use super::SALT_LEN;
    use crate::crypto::encryption::{decode, encode};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(salt: &[u8; SALT_LEN], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(salt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; SALT_LEN], D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = decode(&text).map_err(serde::de::Error::custom)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("salt must be {} bytes", SALT_LEN)))
    }
}
