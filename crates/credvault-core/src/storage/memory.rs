//! In-memory storage backend

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::VaultStore;
use crate::credential::CredentialRecord;
use crate::crypto::MasterKeyMaterial;
use crate::error::Result;

/// Store that lives and dies with the process
#[derive(Default)]
pub struct MemoryStore {
    master: RwLock<Option<MasterKeyMaterial>>,
    records: RwLock<BTreeMap<Uuid, CredentialRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultStore for MemoryStore {
    async fn load_master(&self) -> Result<Option<MasterKeyMaterial>> {
        Ok(self.master.read().await.clone())
    }

    async fn save_master(&self, material: &MasterKeyMaterial) -> Result<()> {
        *self.master.write().await = Some(material.clone());
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<CredentialRecord>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn put_record(&self, record: &CredentialRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> Result<()> {
        self.records.write().await.remove(&id);
        Ok(())
    }

    async fn replace_records(&self, records: &[CredentialRecord]) -> Result<()> {
        let replacement = records.iter().map(|r| (r.id, r.clone())).collect();
        *self.records.write().await = replacement;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.master.write().await = None;
        self.records.write().await.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "In-Memory Storage"
    }
}
