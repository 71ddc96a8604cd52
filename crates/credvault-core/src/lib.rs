//! # credvault-core
//!
//! Cryptographic core of a local credential vault:
//! - Argon2id key derivation with a persisted canary for passphrase checks
//! - AES-256-GCM sealing of every stored password with a fresh nonce
//! - Credential store with search, secondary indexes and atomic import
//! - Session management with an inactivity auto-lock
//! - Clipboard guard that wipes copied secrets

pub mod clipboard;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod password;
pub mod session;
pub mod settings;
pub mod storage;
mod vault;

pub use clipboard::{ClipboardGuard, ClipboardProvider, MemoryClipboard, SystemClipboard};
pub use credential::{CredentialMetadata, CredentialRecord, CredentialStore, CredentialUpdate};
pub use crypto::{KeyDerivationParams, MasterKey, MasterKeyMaterial, SealedPayload, SecretString};
pub use error::{Result, VaultError};
pub use password::{check_strength, generate, GeneratorOptions, Strength, StrengthReport};
pub use session::{SessionInfo, SessionManager, SessionState};
pub use settings::{AutoLockSettings, Settings, SettingsManager};
pub use storage::{FileStore, MemoryStore, VaultStore};
pub use vault::{Vault, VaultState};
