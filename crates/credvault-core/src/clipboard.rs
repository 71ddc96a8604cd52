//! Clipboard handling for revealed passwords
//!
//! A copied secret is wiped from the clipboard after [`CLEAR_DELAY`], but
//! only if the clipboard still holds that exact secret.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::SecretString;
use crate::error::{Result, VaultError};

/// How long a copied secret stays on the clipboard
pub const CLEAR_DELAY: Duration = Duration::from_secs(60);

/// Access to a text clipboard
pub trait ClipboardProvider: Send + Sync {
    /// Current text, or `None` if the clipboard holds no text
    fn read_text(&self) -> Result<Option<String>>;

    /// Replace the clipboard contents
    fn write_text(&self, text: &str) -> Result<()>;

    /// Empty the clipboard
    fn clear(&self) -> Result<()>;
}

/// The OS clipboard
///
/// Owns a single `arboard` handle for its whole life. On X11 and Wayland the
/// copied text is served by that handle, so dropping it would take the
/// secret off the clipboard immediately.
pub struct SystemClipboard {
    clipboard: Mutex<arboard::Clipboard>,
}

fn clipboard_error(e: arboard::Error) -> VaultError {
    VaultError::Clipboard(e.to_string())
}

impl SystemClipboard {
    /// Connect to the OS clipboard
    pub fn new() -> Result<Self> {
        let clipboard = arboard::Clipboard::new().map_err(clipboard_error)?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }

    fn handle(&self) -> Result<std::sync::MutexGuard<'_, arboard::Clipboard>> {
        self.clipboard
            .lock()
            .map_err(|_| VaultError::Clipboard("clipboard mutex poisoned".to_string()))
    }
}

impl ClipboardProvider for SystemClipboard {
    fn read_text(&self) -> Result<Option<String>> {
        match self.handle()?.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(clipboard_error(e)),
        }
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.handle()?.set_text(text).map_err(clipboard_error)
    }

    fn clear(&self) -> Result<()> {
        self.handle()?.clear().map_err(clipboard_error)
    }
}

/// Process-local clipboard, for tests and headless use
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.contents
            .lock()
            .map_err(|_| VaultError::Clipboard("clipboard mutex poisoned".to_string()))
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn read_text(&self) -> Result<Option<String>> {
        Ok(self.slot()?.clone())
    }

    fn write_text(&self, text: &str) -> Result<()> {
        *self.slot()? = Some(text.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Some(mut old) = self.slot()?.take() {
            zeroize::Zeroize::zeroize(&mut old);
        }
        Ok(())
    }
}

/// Copies secrets and schedules their removal
pub struct ClipboardGuard {
    provider: Arc<dyn ClipboardProvider>,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ClipboardGuard {
    /// Guard over the given clipboard with the standard delay
    pub fn new(provider: Arc<dyn ClipboardProvider>) -> Self {
        Self::with_delay(provider, CLEAR_DELAY)
    }

    /// Guard with a custom clear delay
    pub fn with_delay(provider: Arc<dyn ClipboardProvider>, delay: Duration) -> Self {
        Self {
            provider,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Guard over the OS clipboard
    ///
    /// The guard keeps the clipboard connection open until it is dropped.
    pub fn system() -> Result<Self> {
        Ok(Self::new(Arc::new(SystemClipboard::new()?)))
    }

    /// Put a secret on the clipboard and schedule its removal
    ///
    /// Any clear still pending from an earlier copy is dropped. Must be
    /// called from within a tokio runtime.
    pub fn copy_secret(&self, secret: &SecretString) -> Result<()> {
        self.provider.write_text(secret.expose())?;

        let expected = SecretString::new(secret.expose().to_string());
        let provider = Arc::clone(&self.provider);
        let deadline = Instant::now() + self.delay;

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Clipboard APIs block; keep them off the async workers.
            let cleared = tokio::task::spawn_blocking(move || {
                clear_if_unchanged(provider.as_ref(), &expected)
            })
            .await;
            if let Err(e) = cleared {
                warn!("Clipboard clear task failed: {}", e);
            }
        });

        if let Some(previous) = self.replace_pending(Some(handle))? {
            previous.abort();
            debug!("Replaced pending clipboard clear");
        }
        debug!("Copied secret to clipboard; clearing in {}s", self.delay.as_secs());
        Ok(())
    }

    /// Drop the pending clear, leaving the clipboard as it is
    pub fn cancel(&self) -> Result<()> {
        if let Some(handle) = self.replace_pending(None)? {
            handle.abort();
        }
        Ok(())
    }

    /// Wait for the pending clear to run
    pub async fn settle(&self) -> Result<()> {
        if let Some(handle) = self.replace_pending(None)? {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    return Err(VaultError::Clipboard(e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Whether a clear is scheduled
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    fn replace_pending(&self, next: Option<JoinHandle<()>>) -> Result<Option<JoinHandle<()>>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| VaultError::Clipboard("clipboard guard mutex poisoned".to_string()))?;
        Ok(std::mem::replace(&mut *pending, next))
    }
}

impl Drop for ClipboardGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}

fn clear_if_unchanged(provider: &dyn ClipboardProvider, expected: &SecretString) {
    match provider.read_text() {
        Ok(Some(current)) => {
            let current = Zeroizing::new(current);
            if current.as_str() == expected.expose() {
                match provider.clear() {
                    Ok(()) => debug!("Cleared secret from clipboard"),
                    Err(e) => warn!("Failed to clear clipboard: {}", e),
                }
            } else {
                debug!("Clipboard changed since copy; leaving it alone");
            }
        }
        Ok(None) => debug!("Clipboard already empty"),
        Err(e) => warn!("Failed to read clipboard: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> (ClipboardGuard, Arc<MemoryClipboard>) {
        let clipboard = Arc::new(MemoryClipboard::new());
        (ClipboardGuard::new(clipboard.clone()), clipboard)
    }

    #[tokio::test(start_paused = true)]
    async fn test_clears_after_delay() {
        let (guard, clipboard) = guard();
        guard.copy_secret(&SecretString::from("hunter2")).unwrap();
        assert_eq!(clipboard.read_text().unwrap().as_deref(), Some("hunter2"));

        tokio::time::advance(Duration::from_secs(59)).await;
        tokio::task::yield_now().await;
        assert_eq!(clipboard.read_text().unwrap().as_deref(), Some("hunter2"));

        guard.settle().await.unwrap();
        assert_eq!(clipboard.read_text().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaves_changed_clipboard_alone() {
        let (guard, clipboard) = guard();
        guard.copy_secret(&SecretString::from("hunter2")).unwrap();

        clipboard.write_text("something the user copied").unwrap();
        guard.settle().await.unwrap();

        assert_eq!(
            clipboard.read_text().unwrap().as_deref(),
            Some("something the user copied")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_copy_replaces_pending_clear() {
        let (guard, clipboard) = guard();
        guard.copy_secret(&SecretString::from("first")).unwrap();

        tokio::time::advance(Duration::from_secs(40)).await;
        guard.copy_secret(&SecretString::from("second")).unwrap();

        // The first timer would have fired here.
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert_eq!(clipboard.read_text().unwrap().as_deref(), Some("second"));

        guard.settle().await.unwrap();
        assert_eq!(clipboard.read_text().unwrap(), None);
    }

    /// Clipboard that records where it is used and when it goes away
    #[derive(Default)]
    struct TrackingClipboard {
        inner: MemoryClipboard,
        cleared_on: Mutex<Option<std::thread::ThreadId>>,
        dropped: Arc<std::sync::atomic::AtomicBool>,
    }

    impl ClipboardProvider for TrackingClipboard {
        fn read_text(&self) -> Result<Option<String>> {
            self.inner.read_text()
        }
        fn write_text(&self, text: &str) -> Result<()> {
            self.inner.write_text(text)
        }
        fn clear(&self) -> Result<()> {
            *self.cleared_on.lock().unwrap() = Some(std::thread::current().id());
            self.inner.clear()
        }
    }

    impl Drop for TrackingClipboard {
        fn drop(&mut self) {
            self.dropped.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_runs_off_the_async_thread() {
        let clipboard = Arc::new(TrackingClipboard::default());
        let guard = ClipboardGuard::new(clipboard.clone());

        guard.copy_secret(&SecretString::from("hunter2")).unwrap();
        guard.settle().await.unwrap();

        let cleared_on = (*clipboard.cleared_on.lock().unwrap()).expect("clear ran");
        assert_ne!(cleared_on, std::thread::current().id());
        assert_eq!(clipboard.read_text().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_keeps_clipboard_alive_while_pending() {
        let clipboard = TrackingClipboard::default();
        let dropped = clipboard.dropped.clone();
        let guard = ClipboardGuard::new(Arc::new(clipboard));

        guard.copy_secret(&SecretString::from("hunter2")).unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;
        assert!(!dropped.load(std::sync::atomic::Ordering::SeqCst));

        guard.settle().await.unwrap();
        assert!(!dropped.load(std::sync::atomic::Ordering::SeqCst));

        drop(guard);
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_contents() {
        let (guard, clipboard) = guard();
        guard.copy_secret(&SecretString::from("hunter2")).unwrap();
        assert!(guard.is_pending());

        guard.cancel().unwrap();
        assert!(!guard.is_pending());

        tokio::time::advance(Duration::from_secs(120)).await;
        guard.settle().await.unwrap();
        assert_eq!(clipboard.read_text().unwrap().as_deref(), Some("hunter2"));
    }
}
