//! Storage trait definitions

use async_trait::async_trait;
use uuid::Uuid;

use crate::credential::CredentialRecord;
use crate::crypto::MasterKeyMaterial;
use crate::error::Result;

/// Durable persistence for the two vault collections
///
/// Implementations only move bytes; they never see key material or
/// plaintext passwords.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Load the master-key material, if the vault has been set up
    async fn load_master(&self) -> Result<Option<MasterKeyMaterial>>;

    /// Persist the master-key material
    async fn save_master(&self, material: &MasterKeyMaterial) -> Result<()>;

    /// Load every credential record
    async fn load_records(&self) -> Result<Vec<CredentialRecord>>;

    /// Insert or replace one record
    async fn put_record(&self, record: &CredentialRecord) -> Result<()>;

    /// Remove one record; absent ids are not an error
    async fn delete_record(&self, id: Uuid) -> Result<()>;

    /// Replace the whole record collection in one write
    async fn replace_records(&self, records: &[CredentialRecord]) -> Result<()>;

    /// Remove master material and all records
    async fn clear(&self) -> Result<()>;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
