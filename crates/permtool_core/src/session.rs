use std::collections::BTreeMap;

use crate::registry::{PermissionRecord, PermissionType};

/// In-memory record collection for one builder session. Owned by a
/// single logical operation at a time; records live until serialized or
/// removed, nothing is persisted.
///
/// Re-adding a record whose identity key already exists replaces the
/// earlier one in place (last-wins). This is the opposite of the
/// extractor-side merge in [`crate::dedup`], which keeps the first
/// occurrence; the two pipelines intentionally keep their own policies.
#[derive(Debug, Default)]
pub struct PermissionSession {
    records: BTreeMap<PermissionType, Vec<PermissionRecord>>,
}

impl PermissionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge records into the session, deduplicating by identity key
    /// within each type. Returns the number of records that were
    /// replacements rather than new entries.
    pub fn add(&mut self, records: Vec<PermissionRecord>) -> usize {
        let mut replaced = 0;
        for record in records {
            let entries = self.records.entry(record.permission_type()).or_default();
            let key = record.identity_key();
            match entries
                .iter()
                .position(|existing| existing.identity_key() == key)
            {
                Some(index) => {
                    entries[index] = record;
                    replaced += 1;
                }
                None => entries.push(record),
            }
        }
        replaced
    }

    pub fn records(&self, permission_type: PermissionType) -> &[PermissionRecord] {
        self.records
            .get(&permission_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn remove(
        &mut self,
        permission_type: PermissionType,
        index: usize,
    ) -> Option<PermissionRecord> {
        let entries = self.records.get_mut(&permission_type)?;
        if index < entries.len() {
            Some(entries.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn total(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    /// Non-empty per-type counts in registry order.
    pub fn counts(&self) -> Vec<(PermissionType, usize)> {
        self.records
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(permission_type, entries)| (*permission_type, entries.len()))
            .collect()
    }
}
