//! In-memory record collection with secondary indexes

use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::types::CredentialRecord;

/// All records plus lookups by platform and by tag
///
/// Index keys are lowercased so lookups ignore case.
#[derive(Debug, Default, Clone)]
pub(crate) struct Collection {
    records: HashMap<Uuid, CredentialRecord>,
    by_platform: HashMap<String, BTreeSet<Uuid>>,
    by_tag: HashMap<String, BTreeSet<Uuid>>,
}

impl Collection {
    /// Build a collection, rejecting duplicate ids
    pub fn from_records(records: Vec<CredentialRecord>) -> Result<Self, Uuid> {
        let mut collection = Self::default();
        for record in records {
            if collection.records.contains_key(&record.id) {
                return Err(record.id);
            }
            collection.insert(record);
        }
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, id: &Uuid) -> Option<&CredentialRecord> {
        self.records.get(id)
    }

    pub fn insert(&mut self, record: CredentialRecord) {
        self.unindex(&record.id);
        self.by_platform
            .entry(record.platform.to_lowercase())
            .or_default()
            .insert(record.id);
        for tag in &record.tags {
            self.by_tag.entry(tag.to_lowercase()).or_default().insert(record.id);
        }
        self.records.insert(record.id, record);
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<CredentialRecord> {
        self.unindex(id);
        self.records.remove(id)
    }

    /// Records ordered by platform (case-insensitive), then creation time
    pub fn sorted(&self) -> Vec<CredentialRecord> {
        let mut records: Vec<CredentialRecord> = self.records.values().cloned().collect();
        sort_records(&mut records);
        records
    }

    pub fn with_platform(&self, platform: &str) -> Vec<CredentialRecord> {
        self.lookup(self.by_platform.get(&platform.to_lowercase()))
    }

    pub fn with_tag(&self, tag: &str) -> Vec<CredentialRecord> {
        self.lookup(self.by_tag.get(&tag.to_lowercase()))
    }

    /// Every distinct tag, in its stored spelling
    pub fn tags(&self) -> Vec<String> {
        let tags: BTreeSet<&String> = self.records.values().flat_map(|r| r.tags.iter()).collect();
        tags.into_iter().cloned().collect()
    }

    fn lookup(&self, ids: Option<&BTreeSet<Uuid>>) -> Vec<CredentialRecord> {
        let mut records: Vec<CredentialRecord> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.records.get(id).cloned())
            .collect();
        sort_records(&mut records);
        records
    }

    fn unindex(&mut self, id: &Uuid) {
        let Some(old) = self.records.get(id) else {
            return;
        };

        let platform = old.platform.to_lowercase();
        if let Some(ids) = self.by_platform.get_mut(&platform) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_platform.remove(&platform);
            }
        }

        for tag in old.tags.iter().map(|t| t.to_lowercase()) {
            if let Some(ids) = self.by_tag.get_mut(&tag) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_tag.remove(&tag);
                }
            }
        }
    }
}

pub(crate) fn sort_records(records: &mut [CredentialRecord]) {
    records.sort_by(|a, b| {
        a.platform
            .to_lowercase()
            .cmp(&b.platform.to_lowercase())
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}
