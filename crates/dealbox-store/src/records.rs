//! Deal record store.
//!
//! Maps each [`DealKey`] to its [`DealRecord`]. Records are kept decoded;
//! [`DealStore::encoded`] yields the persisted bytes on demand, and the
//! encoded length is what the record's reserve is computed from.

use std::collections::HashMap;

use dealbox_types::{DealKey, DealRecord, DealboxError, Result};

/// All live deal records.
#[derive(Debug, Clone, Default)]
pub struct DealStore {
    records: HashMap<DealKey, DealRecord>,
}

impl DealStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &DealKey) -> Option<&DealRecord> {
        self.records.get(key)
    }

    /// Fetch a record that must exist.
    ///
    /// # Errors
    /// Returns `DealNotFound` if no record is stored under `key`.
    pub fn require(&self, key: &DealKey) -> Result<&DealRecord> {
        self.records
            .get(key)
            .ok_or(DealboxError::DealNotFound(*key))
    }

    #[must_use]
    pub fn contains(&self, key: &DealKey) -> bool {
        self.records.contains_key(key)
    }

    /// Write a record, replacing any previous version.
    pub fn put(&mut self, key: DealKey, record: DealRecord) {
        self.records.insert(key, record);
    }

    pub fn remove(&mut self, key: &DealKey) -> Option<DealRecord> {
        self.records.remove(key)
    }

    /// Persisted bytes of the record under `key`, if any.
    ///
    /// # Errors
    /// Propagates encoding failures.
    pub fn encoded(&self, key: &DealKey) -> Result<Option<Vec<u8>>> {
        self.records.get(key).map(DealRecord::encode).transpose()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DealKey, &DealRecord)> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
