//! File storage backend
//!
//! Keeps the vault in two JSON files in the user's data directory:
//! `master.json` (salt, KDF parameters, canary) and `records.json` (the
//! credential collection, passwords still sealed). Writes go to a temp file
//! that is renamed over the target.

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::VaultStore;
use crate::credential::CredentialRecord;
use crate::crypto::MasterKeyMaterial;
use crate::error::{Result, VaultError};

/// On-disk format version for `records.json`
const RECORDS_FILE_VERSION: u32 = 1;

/// File storage backend
pub struct FileStore {
    /// Directory for storage files
    storage_dir: PathBuf,
    /// In-memory copy of `records.json`, loaded on first use
    cache: RwLock<RecordCache>,
}

#[derive(Default)]
struct RecordCache {
    loaded: bool,
    records: BTreeMap<Uuid, CredentialRecord>,
}

/// File format for the record collection
#[derive(Serialize, Deserialize)]
struct RecordsFile {
    version: u32,
    records: Vec<CredentialRecord>,
}

impl FileStore {
    /// Create a store in the default data directory
    pub fn new() -> Result<Self> {
        Self::with_dir(Self::default_dir()?)
    }

    /// Create with a custom storage directory
    pub fn with_dir(storage_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&storage_dir)?;

        debug!("File storage initialized at: {:?}", storage_dir);

        Ok(Self {
            storage_dir,
            cache: RwLock::new(RecordCache::default()),
        })
    }

    /// Get the default storage directory
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("org", "credvault", "credvault")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| VaultError::Storage("Could not determine data directory".to_string()))
    }

    fn master_file_path(&self) -> PathBuf {
        self.storage_dir.join("master.json")
    }

    fn records_file_path(&self) -> PathBuf {
        self.storage_dir.join("records.json")
    }

    async fn ensure_loaded(&self, cache: &mut RecordCache) -> Result<()> {
        if cache.loaded {
            return Ok(());
        }

        let path = self.records_file_path();
        if path.exists() {
            let contents = tokio::fs::read_to_string(&path).await?;
            let file: RecordsFile = serde_json::from_str(&contents)?;
            if file.version != RECORDS_FILE_VERSION {
                return Err(VaultError::Storage(format!(
                    "unsupported records file version {}",
                    file.version
                )));
            }
            cache.records = file.records.into_iter().map(|r| (r.id, r)).collect();
            debug!("Loaded {} records from storage", cache.records.len());
        } else {
            debug!("No existing records file found");
        }

        cache.loaded = true;
        Ok(())
    }

    async fn write_records(&self, records: &BTreeMap<Uuid, CredentialRecord>) -> Result<()> {
        let file = RecordsFile {
            version: RECORDS_FILE_VERSION,
            records: records.values().cloned().collect(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.records_file_path(), &contents).await?;

        debug!("Saved {} records to storage", records.len());
        Ok(())
    }
}

/// Write through a temp file so a crash never leaves a half-written file
async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, contents).await?;
    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

#[async_trait]
impl VaultStore for FileStore {
    async fn load_master(&self) -> Result<Option<MasterKeyMaterial>> {
        let path = self.master_file_path();

        if !path.exists() {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let material = serde_json::from_str(&contents)
            .map_err(|e| VaultError::Storage(format!("corrupt master key file: {}", e)))?;
        Ok(Some(material))
    }

    async fn save_master(&self, material: &MasterKeyMaterial) -> Result<()> {
        let contents = serde_json::to_string_pretty(material)?;
        write_atomic(&self.master_file_path(), &contents).await?;
        debug!("Saved master key material");
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<CredentialRecord>> {
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;
        Ok(cache.records.values().cloned().collect())
    }

    async fn put_record(&self, record: &CredentialRecord) -> Result<()> {
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;

        let mut next = cache.records.clone();
        next.insert(record.id, record.clone());
        self.write_records(&next).await?;
        cache.records = next;

        debug!("Stored record: {}", record.id);
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> Result<()> {
        let mut cache = self.cache.write().await;
        self.ensure_loaded(&mut cache).await?;

        if cache.records.contains_key(&id) {
            let mut next = cache.records.clone();
            next.remove(&id);
            self.write_records(&next).await?;
            cache.records = next;
            debug!("Deleted record: {}", id);
        }

        Ok(())
    }

    async fn replace_records(&self, records: &[CredentialRecord]) -> Result<()> {
        let mut cache = self.cache.write().await;

        let next: BTreeMap<Uuid, CredentialRecord> =
            records.iter().map(|r| (r.id, r.clone())).collect();
        self.write_records(&next).await?;
        cache.records = next;
        cache.loaded = true;

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut cache = self.cache.write().await;

        for path in [self.master_file_path(), self.records_file_path()] {
            if path.exists() {
                tokio::fs::remove_file(&path).await?;
            }
        }
        cache.records.clear();
        cache.loaded = true;

        debug!("Cleared vault files");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "File Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialMetadata;
    use crate::crypto::{seal_string, KeyDerivationParams, MasterKey};
    use tempfile::TempDir;

    fn record(platform: &str) -> CredentialRecord {
        let key = MasterKey::new([3u8; 32]);
        let metadata = CredentialMetadata::new(platform, "user@example.com");
        CredentialRecord::new(metadata, Some(seal_string("pw", &key).unwrap()))
    }

    #[tokio::test]
    async fn test_master_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        assert!(store.load_master().await.unwrap().is_none());

        let (material, _) =
            MasterKeyMaterial::create("passphrase", KeyDerivationParams::interactive()).unwrap();
        store.save_master(&material).await.unwrap();

        let loaded = store.load_master().await.unwrap().unwrap();
        assert_eq!(loaded.salt(), material.salt());
        assert!(loaded.verify("passphrase").unwrap());
    }

    #[tokio::test]
    async fn test_put_delete_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        let github = record("GitHub");
        let gitlab = record("GitLab");
        store.put_record(&github).await.unwrap();
        store.put_record(&gitlab).await.unwrap();
        assert_eq!(store.load_records().await.unwrap().len(), 2);

        store.delete_record(github.id).await.unwrap();
        store.delete_record(github.id).await.unwrap();

        let remaining = store.load_records().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, gitlab.id);
    }

    #[tokio::test]
    async fn test_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let github = record("GitHub");

        {
            let store = FileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();
            store.put_record(&github).await.unwrap();
        }

        {
            let store = FileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();
            let records = store.load_records().await.unwrap();
            assert_eq!(records, vec![github]);
        }
    }

    #[tokio::test]
    async fn test_replace_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        store.put_record(&record("Old")).await.unwrap();
        let replacement = vec![record("New A"), record("New B")];
        store.replace_records(&replacement).await.unwrap();

        let store = FileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();
        let mut platforms: Vec<String> = store
            .load_records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.platform)
            .collect();
        platforms.sort();
        assert_eq!(platforms, vec!["New A", "New B"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        let (material, _) =
            MasterKeyMaterial::create("passphrase", KeyDerivationParams::interactive()).unwrap();
        store.save_master(&material).await.unwrap();
        store.put_record(&record("GitHub")).await.unwrap();

        store.clear().await.unwrap();

        assert!(store.load_master().await.unwrap().is_none());
        assert!(store.load_records().await.unwrap().is_empty());
        assert!(!temp_dir.path().join("records.json").exists());
    }
}
