//! Error types for credvault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid master passphrase")]
    InvalidPassphrase,

    #[error("Master passphrase must be at least {min} characters")]
    PassphraseTooShort { min: usize },

    #[error("Authentication failed - ciphertext was tampered with or the key is wrong")]
    Authentication,

    #[error("Vault is locked - unlock with the master passphrase first")]
    SessionLocked,

    #[error("Vault is not initialized - run setup first")]
    NotInitialized,

    #[error("Vault is already initialized")]
    AlreadyInitialized,

    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("Import rejected: {0}")]
    ImportValidation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether the caller can reasonably retry or correct the input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VaultError::InvalidPassphrase
                | VaultError::PassphraseTooShort { .. }
                | VaultError::SessionLocked
                | VaultError::NotFound(_)
                | VaultError::ImportValidation(_)
                | VaultError::Clipboard(_)
        )
    }

    /// Message suitable for showing to an end user.
    ///
    /// Internal failures collapse to a generic message so that parameters and
    /// paths never reach the UI; log the error itself for diagnostics.
    pub fn user_message(&self) -> String {
        match self {
            VaultError::Configuration(_)
            | VaultError::Storage(_)
            | VaultError::Io(_)
            | VaultError::Serialization(_) => "Vault unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_are_generic_for_users() {
        let err = VaultError::Configuration("argon2 m_cost=1".to_string());
        assert_eq!(err.user_message(), "Vault unavailable");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_actionable_errors_keep_their_message() {
        let err = VaultError::ImportValidation("record #3: missing field `platform`".to_string());
        assert!(err.user_message().contains("record #3"));
        assert!(err.is_recoverable());
        assert!(VaultError::InvalidPassphrase.is_recoverable());
    }
}
