//! Main vault orchestration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::credential::CredentialStore;
use crate::crypto::{KeyDerivationParams, MasterKeyMaterial};
use crate::error::{Result, VaultError};
use crate::password::validate_passphrase;
use crate::session::{SessionManager, SessionState};
use crate::settings::{AutoLockSettings, SettingsManager};
use crate::storage::{FileStore, VaultStore};

/// Vault state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// Vault has not been created yet
    NotInitialized,
    /// Vault is locked (passphrase required)
    Locked,
    /// Vault is unlocked and ready
    Unlocked,
}

/// Main vault struct that wires storage, session and credentials together
pub struct Vault {
    /// Storage backend
    store: Arc<dyn VaultStore>,
    /// Holder of the derived key
    session: Arc<SessionManager>,
    /// Credential collection
    credentials: CredentialStore,
    /// Settings manager (non-sensitive config)
    settings: SettingsManager,
    /// Parameters used when the vault is first set up
    kdf_params: KeyDerivationParams,
}

impl Vault {
    /// Open the vault in the default data directory
    pub async fn open_default() -> Result<Self> {
        Self::open(FileStore::default_dir()?).await
    }

    /// Open a file-backed vault in `dir`
    pub async fn open(dir: PathBuf) -> Result<Self> {
        let store = Arc::new(FileStore::with_dir(dir.clone())?);
        Self::with_store(store, &dir).await
    }

    /// Open a vault over any storage backend
    pub async fn with_store(store: Arc<dyn VaultStore>, settings_dir: &Path) -> Result<Self> {
        let settings = SettingsManager::new(settings_dir);
        let session = Arc::new(SessionManager::new(store.clone(), settings.auto_lock()));
        let credentials = CredentialStore::new(store.clone(), session.clone());
        credentials.load().await?;

        debug!("Opened vault on {}", store.backend_name());
        Ok(Self {
            store,
            session,
            credentials,
            settings,
            kdf_params: KeyDerivationParams::default(),
        })
    }

    /// Use different key-derivation parameters for [`Vault::setup`]
    pub fn with_kdf_params(mut self, params: KeyDerivationParams) -> Self {
        self.kdf_params = params;
        self
    }

    /// Get the current vault state
    pub async fn state(&self) -> Result<VaultState> {
        if self.store.load_master().await?.is_none() {
            return Ok(VaultState::NotInitialized);
        }
        Ok(match self.session.state().await {
            SessionState::Locked => VaultState::Locked,
            SessionState::Unlocked => VaultState::Unlocked,
        })
    }

    /// Check if the vault is unlocked
    pub async fn is_unlocked(&self) -> bool {
        self.session.is_unlocked().await
    }

    /// Create the vault with a master passphrase and leave it unlocked
    pub async fn setup(&self, passphrase: &str) -> Result<()> {
        validate_passphrase(passphrase)?;

        if self.store.load_master().await?.is_some() || !self.credentials.is_empty().await {
            return Err(VaultError::AlreadyInitialized);
        }

        info!("Initializing new vault");

        let (material, key) = MasterKeyMaterial::create(passphrase, self.kdf_params)?;
        self.store.save_master(&material).await?;
        self.session.begin(key).await;

        info!("Vault initialized successfully");
        Ok(())
    }

    /// Unlock the vault with the master passphrase
    pub async fn unlock(&self, passphrase: &str) -> Result<()> {
        self.session.unlock(passphrase).await
    }

    /// Lock the vault
    pub async fn lock(&self) {
        self.session.lock().await;
    }

    /// Record user activity
    pub async fn activity(&self) {
        self.session.activity().await;
    }

    /// Change the auto-lock policy and persist it
    pub async fn set_auto_lock(&mut self, auto_lock: AutoLockSettings) -> Result<()> {
        self.settings.set_auto_lock(auto_lock).await?;
        self.session.set_auto_lock(auto_lock).await;
        Ok(())
    }

    /// Destroy the master material and every record, and restore default settings
    pub async fn reset(&mut self) -> Result<()> {
        self.session.lock().await;
        self.store.clear().await?;
        self.credentials.load().await?;
        self.settings.reset().await?;
        self.session.set_auto_lock(self.settings.auto_lock()).await;
        info!("Vault reset");
        Ok(())
    }

    /// Credential store
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Session manager
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Settings manager
    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialMetadata;
    use tempfile::TempDir;

    async fn vault(dir: &TempDir) -> Vault {
        Vault::open(dir.path().to_path_buf())
            .await
            .unwrap()
            .with_kdf_params(KeyDerivationParams::interactive())
    }

    #[tokio::test]
    async fn test_vault_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir).await;

        assert_eq!(vault.state().await.unwrap(), VaultState::NotInitialized);

        vault.setup("correct horse").await.unwrap();
        assert_eq!(vault.state().await.unwrap(), VaultState::Unlocked);

        vault.lock().await;
        assert_eq!(vault.state().await.unwrap(), VaultState::Locked);

        vault.unlock("correct horse").await.unwrap();
        assert!(vault.is_unlocked().await);
    }

    #[tokio::test]
    async fn test_setup_rejects_short_passphrase() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir).await;

        let result = vault.setup("short").await;
        assert!(matches!(result, Err(VaultError::PassphraseTooShort { .. })));
        assert_eq!(vault.state().await.unwrap(), VaultState::NotInitialized);
    }

    #[tokio::test]
    async fn test_setup_twice() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir).await;
        vault.setup("correct horse").await.unwrap();

        let result = vault.setup("another passphrase").await;
        assert!(matches!(result, Err(VaultError::AlreadyInitialized)));
    }

    #[tokio::test]
    async fn test_reopen_and_unlock() {
        let temp_dir = TempDir::new().unwrap();
        let id = {
            let vault = vault(&temp_dir).await;
            vault.setup("correct horse").await.unwrap();
            vault
                .credentials()
                .add(CredentialMetadata::new("GitHub", "a@b.com"), "hunter2")
                .await
                .unwrap()
                .id
        };

        let vault = vault(&temp_dir).await;
        assert_eq!(vault.state().await.unwrap(), VaultState::Locked);
        assert!(matches!(
            vault.unlock("wrong horse").await,
            Err(VaultError::InvalidPassphrase)
        ));

        vault.unlock("correct horse").await.unwrap();
        let password = vault.credentials().reveal_password(id).await.unwrap();
        assert_eq!(password.expose(), "hunter2");
    }

    #[tokio::test]
    async fn test_auto_lock_setting_persists() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut vault = vault(&temp_dir).await;
            vault
                .set_auto_lock(AutoLockSettings::after_minutes(5))
                .await
                .unwrap();
        }

        let vault = vault(&temp_dir).await;
        assert_eq!(vault.settings().auto_lock().timeout_minutes, 5);
        assert_eq!(vault.session().info().await.auto_lock.timeout_minutes, 5);
    }

    #[tokio::test]
    async fn test_reset() {
        let temp_dir = TempDir::new().unwrap();
        let mut vault = vault(&temp_dir).await;
        vault
            .set_auto_lock(AutoLockSettings::after_minutes(5))
            .await
            .unwrap();
        vault.setup("correct horse").await.unwrap();
        vault
            .credentials()
            .add(CredentialMetadata::new("GitHub", "a@b.com"), "hunter2")
            .await
            .unwrap();

        vault.reset().await.unwrap();

        assert_eq!(vault.state().await.unwrap(), VaultState::NotInitialized);
        assert!(vault.credentials().is_empty().await);
        assert_eq!(vault.settings().auto_lock(), AutoLockSettings::default());
        assert_eq!(vault.session().info().await.auto_lock, AutoLockSettings::default());
        assert!(!temp_dir.path().join("settings.json").exists());
        vault.setup("fresh passphrase").await.unwrap();
    }
}
