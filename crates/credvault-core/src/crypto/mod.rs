//! Cryptographic primitives for the vault
//!
//! This module provides:
//! - Argon2id key derivation from the master passphrase
//! - AES-256-GCM envelope encryption with per-call random nonces
//! - Canary-based passphrase verification
//! - Secure memory handling with zeroize

pub(crate) mod encryption;
mod key_derivation;
mod material;
mod secure_memory;

pub use encryption::{open, open_string, seal, seal_string, SealedPayload, NONCE_LEN, TAG_LEN};
pub use key_derivation::{derive_key, generate_salt, KeyDerivationParams, KDF_VERSION, SALT_LEN};
pub use material::MasterKeyMaterial;
pub use secure_memory::{MasterKey, SecretString, KEY_LEN};
