//! Credential type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::encryption::{decode, encode};
use crate::crypto::{SealedPayload, NONCE_LEN, TAG_LEN};

/// One stored secret
///
/// Everything except the password is plaintext metadata. The password is a
/// single sealed payload, so its ciphertext and nonce are always set and
/// replaced together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecordWire", into = "RecordWire")]
pub struct CredentialRecord {
    /// Unique identifier, never reused
    pub id: Uuid,
    /// Site or service name (e.g., "GitHub")
    pub platform: String,
    /// Login name on that platform
    pub username: String,
    /// Ordered, de-duplicated tags
    pub tags: Vec<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Where to log in
    pub login_url: Option<String>,
    /// Sealed password; only readable with the vault key
    pub password: Option<SealedPayload>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Build a fresh record with a new id
    pub fn new(metadata: CredentialMetadata, password: Option<SealedPayload>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            platform: metadata.platform,
            username: metadata.username,
            tags: normalize_tags(metadata.tags),
            notes: non_empty(metadata.notes),
            login_url: non_empty(metadata.login_url),
            password,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial metadata update; does not touch the password
    pub(crate) fn apply(&mut self, update: CredentialUpdate) {
        if let Some(platform) = update.platform {
            self.platform = platform;
        }
        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        if let Some(notes) = update.notes {
            self.notes = non_empty(notes);
        }
        if let Some(login_url) = update.login_url {
            self.login_url = non_empty(login_url);
        }
    }

    /// Case-insensitive substring match over platform, username and tags
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.platform.to_lowercase().contains(needle)
            || self.username.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// Metadata supplied when adding a credential
#[derive(Debug, Clone, Default)]
pub struct CredentialMetadata {
    pub platform: String,
    pub username: String,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub login_url: Option<String>,
}

impl CredentialMetadata {
    /// Metadata with just the required fields
    pub fn new(platform: &str, username: &str) -> Self {
        Self {
            platform: platform.to_string(),
            username: username.to_string(),
            ..Default::default()
        }
    }

    /// Replace the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the notes
    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    /// Set the login URL
    pub fn with_login_url(mut self, url: &str) -> Self {
        self.login_url = Some(url.to_string());
        self
    }
}

/// Partial metadata update; `None` leaves a field unchanged
///
/// The optional fields take `Some(None)` to clear them.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub platform: Option<String>,
    pub username: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<Option<String>>,
    pub login_url: Option<Option<String>>,
}

impl CredentialUpdate {
    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.platform.is_none()
            && self.username.is_none()
            && self.tags.is_none()
            && self.notes.is_none()
            && self.login_url.is_none()
    }
}

/// Trim tags, drop empty ones and remove duplicates, keeping first occurrence
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Serialized shape of a record, as found in `records.json` and exports
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordWire {
    id: Uuid,
    platform: String,
    username: String,
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    login_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password_ciphertext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password_nonce: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordWire> for CredentialRecord {
    type Error = String;

    fn try_from(wire: RecordWire) -> Result<Self, Self::Error> {
        let password = match (wire.password_ciphertext, wire.password_nonce) {
            (Some(ciphertext), Some(nonce)) => {
                let ciphertext = decode(&ciphertext)
                    .map_err(|e| format!("passwordCiphertext is not valid base64: {}", e))?;
                if ciphertext.len() < TAG_LEN {
                    return Err("passwordCiphertext is truncated".to_string());
                }
                let nonce = decode(&nonce)
                    .map_err(|e| format!("passwordNonce is not valid base64: {}", e))?;
                let nonce: [u8; NONCE_LEN] = nonce.as_slice().try_into().map_err(|_| {
                    format!("passwordNonce must be {} bytes, got {}", NONCE_LEN, nonce.len())
                })?;
                Some(SealedPayload::from_parts(ciphertext, nonce))
            }
            (None, None) => None,
            (Some(_), None) => return Err("passwordCiphertext present without passwordNonce".to_string()),
            (None, Some(_)) => return Err("passwordNonce present without passwordCiphertext".to_string()),
        };

        Ok(Self {
            id: wire.id,
            platform: wire.platform,
            username: wire.username,
            tags: normalize_tags(wire.tags),
            notes: wire.notes,
            login_url: wire.login_url,
            password,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

impl From<CredentialRecord> for RecordWire {
    fn from(record: CredentialRecord) -> Self {
        let (password_ciphertext, password_nonce) = match &record.password {
            Some(sealed) => (Some(encode(sealed.ciphertext())), Some(encode(sealed.nonce()))),
            None => (None, None),
        };

        Self {
            id: record.id,
            platform: record.platform,
            username: record.username,
            tags: record.tags,
            notes: record.notes,
            login_url: record.login_url,
            password_ciphertext,
            password_nonce,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
