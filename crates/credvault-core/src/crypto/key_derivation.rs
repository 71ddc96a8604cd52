//! Password-based key derivation using Argon2id

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::secure_memory::{MasterKey, KEY_LEN};
use crate::error::{Result, VaultError};

/// Length of the persisted salt in bytes
pub const SALT_LEN: usize = 16;

/// Argon2 rejects salts shorter than this
const MIN_SALT_LEN: usize = 8;

/// Current key-derivation format version
pub const KDF_VERSION: u32 = 1;

/// Parameters for Argon2id key derivation
///
/// Fixed when the vault is created and stored next to the salt; every unlock
/// uses the persisted values, so changing the defaults never affects an
/// existing vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDerivationParams {
    /// Format version the parameters belong to
    pub version: u32,
    /// Memory cost in KiB (default: 65536 = 64MB)
    pub memory_cost: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            version: KDF_VERSION,
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    /// Light preset (8 MB, single pass) for tests and constrained devices
    pub fn interactive() -> Self {
        Self {
            version: KDF_VERSION,
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn to_argon2(self) -> Result<Params> {
        if self.version != KDF_VERSION {
            return Err(VaultError::Configuration(format!(
                "unsupported key derivation version {}",
                self.version
            )));
        }

        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultError::Configuration(format!("invalid key derivation parameters: {}", e)))
    }
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from a passphrase using Argon2id
///
/// Deterministic for the same passphrase, salt and parameters. Any passphrase
/// derives *some* key; use [`super::MasterKeyMaterial::verify`] to find out
/// whether it is the right one.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: &KeyDerivationParams,
) -> Result<MasterKey> {
    if salt.is_empty() {
        return Err(VaultError::Configuration("salt must not be empty".to_string()));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(VaultError::Configuration(format!(
            "salt must be at least {} bytes",
            MIN_SALT_LEN
        )));
    }

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key_bytes = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes)
        .map_err(|e| VaultError::Configuration(format!("key derivation failed: {}", e)))?;

    let key = MasterKey::new(key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> KeyDerivationParams {
        KeyDerivationParams::interactive()
    }

    #[test]
    fn test_generate_salt() {
        let salt1 = generate_salt();
        let salt2 = generate_salt();

        assert_eq!(salt1.len(), SALT_LEN);
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = generate_salt();

        let key1 = derive_key("test-password-123", &salt, &params()).unwrap();
        let key2 = derive_key("test-password-123", &salt, &params()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_passwords() {
        let salt = generate_salt();

        let key1 = derive_key("password1", &salt, &params()).unwrap();
        let key2 = derive_key("password2", &salt, &params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salts() {
        let key1 = derive_key("test-password", &generate_salt(), &params()).unwrap();
        let key2 = derive_key("test-password", &generate_salt(), &params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_salt_is_configuration_error() {
        let result = derive_key("test-password", &[], &params());
        assert!(matches!(result, Err(VaultError::Configuration(_))));
    }

    #[test]
    fn test_invalid_params_are_configuration_error() {
        let bad = KeyDerivationParams {
            parallelism: 0,
            ..params()
        };
        let result = derive_key("test-password", &generate_salt(), &bad);
        assert!(matches!(result, Err(VaultError::Configuration(_))));

        let future = KeyDerivationParams {
            version: KDF_VERSION + 1,
            ..params()
        };
        let result = derive_key("test-password", &generate_salt(), &future);
        assert!(matches!(result, Err(VaultError::Configuration(_))));
    }

    #[test]
    fn test_derive_key_with_default_params() {
        let key = derive_key("test-password", &generate_salt(), &KeyDerivationParams::default())
            .unwrap();
        assert_eq!(key.as_bytes().len(), 32);
    }
}
