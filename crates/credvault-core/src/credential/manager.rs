//! Credential store for CRUD, search and import/export

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::index::Collection;
use super::types::{CredentialMetadata, CredentialRecord, CredentialUpdate};
use crate::crypto::SecretString;
use crate::error::{Result, VaultError};
use crate::session::SessionManager;
use crate::storage::VaultStore;

/// Credential store
///
/// Keeps the whole collection in memory behind one `RwLock`, writes through
/// to the backing [`VaultStore`] before changing it, and goes through the
/// [`SessionManager`] for every seal and open.
pub struct CredentialStore {
    /// Storage backend
    store: Arc<dyn VaultStore>,
    /// Holder of the vault key
    session: Arc<SessionManager>,
    /// In-memory collection with secondary indexes
    collection: RwLock<Collection>,
}

impl CredentialStore {
    /// Create an empty credential store
    pub fn new(store: Arc<dyn VaultStore>, session: Arc<SessionManager>) -> Self {
        Self {
            store,
            session,
            collection: RwLock::new(Collection::default()),
        }
    }

    /// Reload the collection from storage
    pub async fn load(&self) -> Result<()> {
        let records = self.store.load_records().await?;
        let loaded = Collection::from_records(records).map_err(|id| {
            VaultError::Storage(format!("duplicate record id in storage: {}", id))
        })?;

        let mut collection = self.collection.write().await;
        *collection = loaded;
        debug!("Loaded {} credentials", collection.len());
        Ok(())
    }

    /// Add a credential, sealing its password with the session key
    pub async fn add(&self, metadata: CredentialMetadata, password: &str) -> Result<CredentialRecord> {
        let sealed = self.session.seal(password).await?;
        let record = CredentialRecord::new(metadata, Some(sealed));

        let mut collection = self.collection.write().await;
        self.store.put_record(&record).await?;
        collection.insert(record.clone());
        drop(collection);

        self.session.activity().await;
        info!("Added credential: {} ({})", record.id, record.platform);
        Ok(record)
    }

    /// Update metadata and optionally replace the password
    ///
    /// The stored ciphertext is only touched when `new_password` is given, so
    /// metadata edits work while the vault is locked.
    pub async fn update(
        &self,
        id: Uuid,
        update: CredentialUpdate,
        new_password: Option<&str>,
    ) -> Result<CredentialRecord> {
        let mut collection = self.collection.write().await;
        let mut record = collection
            .get(&id)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;

        if let Some(password) = new_password {
            record.password = Some(self.session.seal(password).await?);
        }
        record.apply(update);
        record.updated_at = chrono::Utc::now();

        self.store.put_record(&record).await?;
        collection.insert(record.clone());
        drop(collection);

        self.session.activity().await;
        info!("Updated credential: {}", id);
        Ok(record)
    }

    /// Delete a credential; unknown ids are ignored
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut collection = self.collection.write().await;
        self.store.delete_record(id).await?;
        if collection.remove(&id).is_some() {
            info!("Deleted credential: {}", id);
        }
        Ok(())
    }

    /// Get a credential by id, password still sealed
    pub async fn get(&self, id: Uuid) -> Result<CredentialRecord> {
        self.collection
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(id.to_string()))
    }

    /// All credentials, ordered by platform then creation time
    pub async fn get_all(&self) -> Vec<CredentialRecord> {
        self.collection.read().await.sorted()
    }

    /// Decrypt a credential's password
    pub async fn reveal_password(&self, id: Uuid) -> Result<SecretString> {
        let record = self.get(id).await?;
        let sealed = record
            .password
            .as_ref()
            .ok_or_else(|| VaultError::NotFound(format!("{} has no stored password", id)))?;

        let secret = self.session.open(sealed).await?;
        self.session.activity().await;
        debug!("Revealed password for credential: {}", id);
        Ok(secret)
    }

    /// Case-insensitive substring search over platform, username and tags
    pub async fn search(&self, query: &str) -> Vec<CredentialRecord> {
        self.filter(query, &[]).await
    }

    /// Search combined with "has any of these tags"
    ///
    /// An empty query or an empty tag list does not restrict the result.
    pub async fn filter(&self, query: &str, tags: &[String]) -> Vec<CredentialRecord> {
        let needle = query.trim().to_lowercase();
        let wanted: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();

        self.collection
            .read()
            .await
            .sorted()
            .into_iter()
            .filter(|r| needle.is_empty() || r.matches(&needle))
            .filter(|r| {
                wanted.is_empty()
                    || r.tags.iter().any(|t| wanted.contains(&t.to_lowercase()))
            })
            .collect()
    }

    /// Credentials for one platform (exact, case-insensitive)
    pub async fn by_platform(&self, platform: &str) -> Vec<CredentialRecord> {
        self.collection.read().await.with_platform(platform.trim())
    }

    /// Credentials carrying one tag (exact, case-insensitive)
    pub async fn by_tag(&self, tag: &str) -> Vec<CredentialRecord> {
        self.collection.read().await.with_tag(tag.trim())
    }

    /// Every distinct tag, sorted
    pub async fn tags(&self) -> Vec<String> {
        self.collection.read().await.tags()
    }

    /// Number of stored credentials
    pub async fn len(&self) -> usize {
        self.collection.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Serialize every record, passwords still sealed
    pub async fn export_all(&self) -> Result<String> {
        let records = self.get_all().await;
        let json = serde_json::to_string_pretty(&records)?;
        info!("Exported {} credentials", records.len());
        Ok(json)
    }

    /// Replace the whole collection with an exported blob
    ///
    /// Every record is validated before anything is written; on error the
    /// store and the in-memory collection are unchanged.
    pub async fn import_all(&self, blob: &str) -> Result<usize> {
        let records = parse_import(blob).map_err(|e| {
            warn!("Rejected import: {}", e);
            e
        })?;
        let count = records.len();
        let replacement = Collection::from_records(records.clone()).map_err(|id| {
            warn!("Rejected import: duplicate id {}", id);
            VaultError::ImportValidation(format!("duplicate record id {}", id))
        })?;

        let mut collection = self.collection.write().await;
        self.store.replace_records(&records).await?;
        *collection = replacement;

        info!("Imported {} credentials", count);
        Ok(count)
    }
}

fn parse_import(blob: &str) -> Result<Vec<CredentialRecord>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(blob).map_err(|e| {
        VaultError::ImportValidation(format!("expected a JSON array of records: {}", e))
    })?;

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<CredentialRecord>(value).map_err(|e| {
                VaultError::ImportValidation(format!("record at index {}: {}", index, e))
            })
        })
        .collect()
}
