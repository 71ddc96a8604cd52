//! Session management: the live vault key and auto-lock
//!
//! The session manager is the only owner of the derived key. Whether the
//! vault is unlocked is decided by one thing alone: whether a key is held.
//! Transitions (unlock, lock, activity) and every use of the key go through
//! the same `RwLock`, so a key can never be read once a lock has started.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::crypto::{self, MasterKey, SealedPayload, SecretString};
use crate::error::{Result, VaultError};
use crate::settings::AutoLockSettings;
use crate::storage::VaultStore;

/// Lock state of the vault session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No key held
    Locked,
    /// Key held; credentials can be sealed and opened
    Unlocked,
}

/// Point-in-time view of the session, safe to hand to a UI
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub state: SessionState,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub auto_lock: AutoLockSettings,
}

/// An unlocked session; dropping it zeroizes the key
struct ActiveSession {
    key: MasterKey,
    unlocked_at: DateTime<Utc>,
    last_activity: Instant,
    last_activity_at: DateTime<Utc>,
}

impl ActiveSession {
    fn new(key: MasterKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            unlocked_at: now,
            last_activity: Instant::now(),
            last_activity_at: now,
        }
    }

    /// Idle time by both the monotonic and the wall clock
    ///
    /// Monotonic time can stand still while the machine sleeps, so the
    /// larger of the two wins.
    fn idle_for(&self) -> Duration {
        let monotonic = self.last_activity.elapsed();
        let wall = (Utc::now() - self.last_activity_at)
            .to_std()
            .unwrap_or_default();
        monotonic.max(wall)
    }
}

struct SessionInner {
    active: Option<ActiveSession>,
    auto_lock: AutoLockSettings,
    timer: Option<JoinHandle<()>>,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Unlocked
        } else {
            SessionState::Locked
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn idle_expired(&self) -> bool {
        match (&self.active, self.auto_lock.timeout()) {
            (Some(active), Some(timeout)) => active.idle_for() >= timeout,
            _ => false,
        }
    }
}

/// Owner of the derived key and the auto-lock timer
pub struct SessionManager {
    store: Arc<dyn VaultStore>,
    inner: Arc<RwLock<SessionInner>>,
    events: Arc<watch::Sender<SessionState>>,
}

impl SessionManager {
    /// Create a locked session manager
    pub fn new(store: Arc<dyn VaultStore>, auto_lock: AutoLockSettings) -> Self {
        let (events, _) = watch::channel(SessionState::Locked);
        Self {
            store,
            inner: Arc::new(RwLock::new(SessionInner {
                active: None,
                auto_lock,
                timer: None,
            })),
            events: Arc::new(events),
        }
    }

    /// Current state
    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state()
    }

    /// Whether a key is held
    pub async fn is_unlocked(&self) -> bool {
        self.state().await == SessionState::Unlocked
    }

    /// Snapshot of the session
    pub async fn info(&self) -> SessionInfo {
        let inner = self.inner.read().await;
        SessionInfo {
            state: inner.state(),
            unlocked_at: inner.active.as_ref().map(|a| a.unlocked_at),
            last_activity_at: inner.active.as_ref().map(|a| a.last_activity_at),
            auto_lock: inner.auto_lock,
        }
    }

    /// Watch state changes, including auto-lock
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.events.subscribe()
    }

    /// Unlock with the master passphrase
    ///
    /// The passphrase is checked against the vault's canary; a wrong one
    /// leaves the session locked and returns [`VaultError::InvalidPassphrase`].
    /// On an unlocked session the passphrase is still checked, but the
    /// session itself is left untouched.
    pub async fn unlock(&self, passphrase: &str) -> Result<()> {
        let mut inner = self.inner.write().await;

        let material = self
            .store
            .load_master()
            .await?
            .ok_or(VaultError::NotInitialized)?;

        if inner.active.is_some() {
            if !material.verify(passphrase)? {
                warn!("Unlock attempt with wrong passphrase");
                return Err(VaultError::InvalidPassphrase);
            }
            debug!("Session already unlocked");
            return Ok(());
        }

        let key = match material.unlock(passphrase) {
            Ok(key) => key,
            Err(VaultError::InvalidPassphrase) => {
                warn!("Unlock attempt with wrong passphrase");
                return Err(VaultError::InvalidPassphrase);
            }
            Err(e) => return Err(e),
        };

        self.activate(&mut inner, key);
        info!("Vault unlocked");
        Ok(())
    }

    /// Start a session with a key that was just created at setup
    pub(crate) async fn begin(&self, key: MasterKey) {
        let mut inner = self.inner.write().await;
        self.activate(&mut inner, key);
        info!("Vault session started");
    }

    /// Lock: discard the key and stop the timer
    pub async fn lock(&self) {
        let mut inner = self.inner.write().await;
        inner.cancel_timer();
        if inner.active.take().is_some() {
            self.events.send_replace(SessionState::Locked);
            info!("Vault locked");
        }
    }

    /// Record user activity and push the auto-lock deadline out
    ///
    /// Ignored while locked.
    pub async fn activity(&self) {
        let mut inner = self.inner.write().await;
        let Some(active) = inner.active.as_mut() else {
            return;
        };
        active.last_activity = Instant::now();
        active.last_activity_at = Utc::now();
        self.arm(&mut inner);
    }

    /// Replace the auto-lock policy; applies to the running session too
    pub async fn set_auto_lock(&self, auto_lock: AutoLockSettings) {
        let mut inner = self.inner.write().await;
        inner.auto_lock = auto_lock;
        if inner.active.is_some() {
            self.arm(&mut inner);
        }
        debug!("Auto-lock policy set to {:?}", auto_lock);
    }

    /// Run the inactivity check now, e.g. after the host resumes
    ///
    /// Returns true if this call locked the vault.
    pub async fn enforce_auto_lock(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.idle_expired() {
            return false;
        }
        inner.cancel_timer();
        inner.active = None;
        self.events.send_replace(SessionState::Locked);
        info!("Vault auto-locked after inactivity");
        true
    }

    /// Run `f` with the key, or fail with [`VaultError::SessionLocked`]
    pub async fn with_key<R>(&self, f: impl FnOnce(&MasterKey) -> Result<R>) -> Result<R> {
        let inner = self.inner.read().await;
        let active = inner.active.as_ref().ok_or(VaultError::SessionLocked)?;
        f(&active.key)
    }

    /// Seal a password under the session key
    pub async fn seal(&self, plaintext: &str) -> Result<SealedPayload> {
        self.with_key(|key| crypto::seal_string(plaintext, key)).await
    }

    /// Open a sealed password with the session key
    pub async fn open(&self, sealed: &SealedPayload) -> Result<SecretString> {
        self.with_key(|key| crypto::open_string(sealed, key)).await
    }

    fn activate(&self, inner: &mut SessionInner, key: MasterKey) {
        inner.active = Some(ActiveSession::new(key));
        self.arm(inner);
        self.events.send_replace(SessionState::Unlocked);
    }

    /// (Re)schedule the auto-lock timer from the last activity
    fn arm(&self, inner: &mut SessionInner) {
        inner.cancel_timer();

        let (Some(active), Some(timeout)) = (&inner.active, inner.auto_lock.timeout()) else {
            return;
        };

        let deadline = active.last_activity + timeout;
        inner.timer = Some(spawn_auto_lock(
            Arc::downgrade(&self.inner),
            self.events.clone(),
            deadline,
        ));
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_write() {
            inner.cancel_timer();
            inner.active = None;
        }
    }
}

/// Background task that locks the session once the deadline passes
///
/// On wake it re-checks real idle time; if activity moved the goalposts or
/// the timer fired early, it sleeps again for the remainder.
fn spawn_auto_lock(
    inner: Weak<RwLock<SessionInner>>,
    events: Arc<watch::Sender<SessionState>>,
    mut deadline: Instant,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep_until(deadline).await;

            let Some(shared) = inner.upgrade() else {
                return;
            };
            let mut guard = shared.write().await;

            let Some(timeout) = guard.auto_lock.timeout() else {
                return;
            };
            let idle = match &guard.active {
                Some(active) => active.idle_for(),
                None => return,
            };

            if idle >= timeout {
                // This task's own handle: dropping it does not abort us.
                guard.timer.take();
                guard.active = None;
                events.send_replace(SessionState::Locked);
                info!("Vault auto-locked after {}s of inactivity", idle.as_secs());
                return;
            }

            deadline = Instant::now() + (timeout - idle);
            debug!("Auto-lock timer fired early; re-armed");
        }
    })
}
