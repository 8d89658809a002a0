//! The unit of atomic change and the log of applied changes.
//!
//! Every protocol call is planned into one [`Changeset`] from shared
//! references to the current state. Only a fully planned changeset is
//! committed, and committing it cannot fail, so a call either takes full
//! effect or none at all.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dealbox_store::{DealCounters, RegistryWrite, SideDataKey, SideDataWrite};
use dealbox_types::{Address, DealKey, DealRecord, Payout, Transfer};

/// Protocol call a changeset was planned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Attach,
    Match,
    Adjust,
    Agree,
    Recall,
    Reject,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Attach => "attach",
            Self::Match => "match",
            Self::Adjust => "adjust",
            Self::Agree => "agree",
            Self::Recall => "recall",
            Self::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// What happens to the deal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// Store a new record. Planning already checked the key is free.
    Insert(DealRecord),
    /// Replace the stored record.
    Update(DealRecord),
    /// Remove the record.
    Delete,
}

/// Every state mutation of one protocol call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub operation: Operation,
    pub deal_key: DealKey,
    pub record: RecordChange,
    pub registry_writes: Vec<RegistryWrite>,
    pub registry_erasures: Vec<(Address, u64)>,
    pub side_data_write: Option<SideDataWrite>,
    pub side_data_removals: Vec<SideDataKey>,
    /// Counter values after the call, if they change.
    pub counters: Option<DealCounters>,
    /// Funding transfers into the escrow.
    pub inbound: Vec<Transfer>,
    /// Transfers out of the escrow.
    pub payouts: Vec<Payout>,
    /// Part of `inbound` that pays box reserve rather than deal funds.
    pub reserve_received: u64,
}

impl Changeset {
    #[must_use]
    pub fn new(operation: Operation, deal_key: DealKey, record: RecordChange) -> Self {
        Self {
            operation,
            deal_key,
            record,
            registry_writes: Vec::new(),
            registry_erasures: Vec::new(),
            side_data_write: None,
            side_data_removals: Vec::new(),
            counters: None,
            inbound: Vec::new(),
            payouts: Vec::new(),
            reserve_received: 0,
        }
    }
}

/// Unique identifier of one commit (UUIDv7, time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitId(pub Uuid);

impl CommitId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CommitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "commit:{}", self.0)
    }
}

/// One applied changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub id: CommitId,
    /// Position in the log, starting at 1.
    pub sequence: u64,
    pub operation: Operation,
    pub deal_key: DealKey,
    pub payouts: usize,
    pub committed_at: DateTime<Utc>,
}

/// Append-only record of every commit.
#[derive(Debug, Clone, Default)]
pub struct CommitLog {
    entries: Vec<CommitEntry>,
}

impl CommitLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, changeset: &Changeset) -> &CommitEntry {
        let entry = CommitEntry {
            id: CommitId::new(),
            sequence: self.entries.len() as u64 + 1,
            operation: changeset.operation,
            deal_key: changeset.deal_key,
            payouts: changeset.payouts.len(),
            committed_at: Utc::now(),
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    #[must_use]
    pub fn entries(&self) -> &[CommitEntry] {
        &self.entries
    }

    /// Entries touching one deal, oldest first.
    pub fn for_deal<'a>(&'a self, key: &'a DealKey) -> impl Iterator<Item = &'a CommitEntry> + 'a {
        self.entries.iter().filter(move |e| e.deal_key == *key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(note: &str) -> DealKey {
        DealKey::derive(&Address::repeat(1), &Address::repeat(2), note).unwrap()
    }

    #[test]
    fn sequence_increases_and_ids_are_unique() {
        let mut log = CommitLog::new();
        let first = log
            .append(&Changeset::new(Operation::Create, key("a"), RecordChange::Delete))
            .clone();
        let second = log
            .append(&Changeset::new(Operation::Recall, key("a"), RecordChange::Delete))
            .clone();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_ne!(first.id, second.id);
        assert!(second.committed_at >= first.committed_at);
    }

    #[test]
    fn filter_by_deal() {
        let mut log = CommitLog::new();
        log.append(&Changeset::new(Operation::Create, key("a"), RecordChange::Delete));
        log.append(&Changeset::new(Operation::Create, key("b"), RecordChange::Delete));
        log.append(&Changeset::new(Operation::Reject, key("a"), RecordChange::Delete));
        let ops: Vec<_> = log.for_deal(&key("a")).map(|e| e.operation).collect();
        assert_eq!(ops, vec![Operation::Create, Operation::Reject]);
    }

    #[test]
    fn entry_serializes() {
        let mut log = CommitLog::new();
        let entry = log
            .append(&Changeset::new(Operation::Agree, key("a"), RecordChange::Delete))
            .clone();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["operation"], "agree");
        assert_eq!(json["sequence"], 1);
    }
}
