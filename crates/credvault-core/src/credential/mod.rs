//! Credential records and the store that owns them

mod index;
mod manager;
mod types;

pub use manager::CredentialStore;
pub use types::{normalize_tags, CredentialMetadata, CredentialRecord, CredentialUpdate};
