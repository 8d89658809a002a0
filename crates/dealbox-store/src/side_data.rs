//! Per-account, per-deal side data.
//!
//! Each party of a deal may keep one auxiliary byte box for it, keyed by
//! `(account, deal key digest)`. The box is created on the first write,
//! zero-filled to a caller-declared length, and then filled in chunks at
//! arbitrary offsets. Ordering and completeness of chunks are the
//! caller's business.

use std::collections::HashMap;

use dealbox_types::{Address, DealKey, DealboxError, Result, constants::SIDE_DATA_KEY_LEN};

/// Storage key of one side-data box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SideDataKey {
    pub account: Address,
    pub digest: [u8; 32],
}

impl SideDataKey {
    #[must_use]
    pub fn for_deal(account: Address, deal: &DealKey) -> Self {
        Self {
            account,
            digest: deal.digest(),
        }
    }

    /// Persisted key: `account || digest`.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIDE_DATA_KEY_LEN] {
        let mut out = [0u8; SIDE_DATA_KEY_LEN];
        out[..32].copy_from_slice(self.account.as_bytes());
        out[32..].copy_from_slice(&self.digest);
        out
    }
}

/// A chunk write that passed bounds checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideDataWrite {
    pub key: SideDataKey,
    /// Length of the box created by this write, `None` if it already existed.
    pub allocates: Option<u64>,
    pub offset: u64,
    pub chunk: Vec<u8>,
}

/// All side-data boxes.
#[derive(Debug, Clone, Default)]
pub struct SideDataStore {
    boxes: HashMap<SideDataKey, Vec<u8>>,
}

impl SideDataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a chunk write without touching state.
    ///
    /// `declared_len` only matters when the box does not exist yet; an
    /// existing box keeps the length it was created with.
    ///
    /// # Errors
    /// - `PayloadTooLarge` if a new box would exceed `max_len`
    /// - `PayloadOutOfBounds` if the chunk does not fit inside the box
    pub fn plan_write(
        &self,
        key: SideDataKey,
        declared_len: u64,
        offset: u64,
        chunk: &[u8],
        max_len: u64,
    ) -> Result<SideDataWrite> {
        let (box_len, allocates) = match self.boxes.get(&key) {
            Some(existing) => (existing.len() as u64, None),
            None => {
                if declared_len > max_len {
                    return Err(DealboxError::PayloadTooLarge {
                        len: declared_len,
                        max: max_len,
                    });
                }
                (declared_len, Some(declared_len))
            }
        };

        let chunk_len = chunk.len() as u64;
        let fits = offset
            .checked_add(chunk_len)
            .is_some_and(|end| end <= box_len);
        if !fits {
            return Err(DealboxError::PayloadOutOfBounds {
                offset,
                len: chunk_len,
                box_len,
            });
        }

        Ok(SideDataWrite {
            key,
            allocates,
            offset,
            chunk: chunk.to_vec(),
        })
    }

    /// Apply a validated write.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply_write(&mut self, write: SideDataWrite) {
        let data = self
            .boxes
            .entry(write.key)
            .or_insert_with(|| vec![0u8; write.allocates.unwrap_or(0) as usize]);
        let start = write.offset as usize;
        if let Some(target) = data.get_mut(start..start + write.chunk.len()) {
            target.copy_from_slice(&write.chunk);
        }
        tracing::debug!(
            account = %write.key.account,
            offset = write.offset,
            len = write.chunk.len(),
            allocated = ?write.allocates,
            "Side data written"
        );
    }

    /// Delete a box. Missing boxes are ignored.
    pub fn remove(&mut self, key: &SideDataKey) -> Option<Vec<u8>> {
        self.boxes.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &SideDataKey) -> Option<&[u8]> {
        self.boxes.get(key).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 1024;

    fn key() -> SideDataKey {
        let a = Address::repeat(1);
        let deal = DealKey::derive(&a, &Address::repeat(2), "n").unwrap();
        SideDataKey::for_deal(a, &deal)
    }

    #[test]
    fn key_layout_is_account_then_digest() {
        let a = Address::repeat(1);
        let deal = DealKey::derive(&a, &Address::repeat(2), "n").unwrap();
        let bytes = SideDataKey::for_deal(a, &deal).to_bytes();
        assert_eq!(&bytes[..32], a.as_bytes());
        assert_eq!(&bytes[32..], &deal.as_bytes()[1..]);
    }

    #[test]
    fn first_write_allocates_zero_filled_box() {
        let mut store = SideDataStore::new();
        let write = store.plan_write(key(), 8, 2, b"ab", MAX).unwrap();
        assert_eq!(write.allocates, Some(8));
        store.apply_write(write);
        assert_eq!(store.get(&key()).unwrap(), &[0, 0, b'a', b'b', 0, 0, 0, 0]);
    }

    #[test]
    fn later_chunks_fill_existing_box() {
        let mut store = SideDataStore::new();
        store.apply_write(store.plan_write(key(), 4, 0, b"ab", MAX).unwrap());
        // Declared length is ignored once the box exists
        let write = store.plan_write(key(), 999, 2, b"cd", MAX).unwrap();
        assert_eq!(write.allocates, None);
        store.apply_write(write);
        assert_eq!(store.get(&key()).unwrap(), b"abcd");
    }

    #[test]
    fn chunk_past_end_rejected() {
        let mut store = SideDataStore::new();
        store.apply_write(store.plan_write(key(), 4, 0, b"", MAX).unwrap());
        let err = store.plan_write(key(), 4, 3, b"xy", MAX).unwrap_err();
        assert_eq!(
            err,
            DealboxError::PayloadOutOfBounds {
                offset: 3,
                len: 2,
                box_len: 4
            }
        );
        let err = store.plan_write(key(), 4, u64::MAX, b"x", MAX).unwrap_err();
        assert!(matches!(err, DealboxError::PayloadOutOfBounds { .. }));
    }

    #[test]
    fn oversized_declaration_rejected() {
        let store = SideDataStore::new();
        let err = store.plan_write(key(), MAX + 1, 0, b"", MAX).unwrap_err();
        assert_eq!(
            err,
            DealboxError::PayloadTooLarge {
                len: MAX + 1,
                max: MAX
            }
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let mut store = SideDataStore::new();
        store.apply_write(store.plan_write(key(), 1, 0, b"z", MAX).unwrap());
        assert!(store.remove(&key()).is_some());
        assert!(store.remove(&key()).is_none());
        assert!(store.get(&key()).is_none());
    }
}
