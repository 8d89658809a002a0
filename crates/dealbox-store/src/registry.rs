//! Per-account deal-key registry.
//!
//! Every account owns one fixed-capacity array of slots, each holding a
//! [`DealKey`] or nothing. The slot index is chosen by the caller and
//! tracked off-system; the registry only guarantees a slot is free before
//! writing and zeroes it on removal. There is no compaction.
//!
//! A registry is allocated lazily on first use and its reserve is charged
//! exactly once. A freshly allocated registry always receives its first
//! key at slot 0, whatever index the caller supplied.

use std::collections::HashMap;

use dealbox_types::{Address, DealKey, DealboxError, Result, constants::DEAL_KEY_LEN};

/// The slots of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRegistry {
    slots: Vec<Option<DealKey>>,
}

impl AccountRegistry {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Key held at `index`, if any. Out-of-range indices read as empty.
    #[must_use]
    pub fn get(&self, index: u64) -> Option<DealKey> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get(i).copied().flatten())
    }

    /// Occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (u64, DealKey)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|key| (i as u64, key)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Persisted layout: `capacity × 33` bytes, empty slots all-zero.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.slots.len() * DEAL_KEY_LEN);
        for slot in &self.slots {
            match slot {
                Some(key) => out.extend_from_slice(key.as_bytes()),
                None => out.extend_from_slice(&[0u8; DEAL_KEY_LEN]),
            }
        }
        out
    }

    /// Parse the persisted layout.
    ///
    /// # Errors
    /// Returns `Serialization` if the length is not a multiple of 33 or a
    /// non-zero slot is not a well-formed deal key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % DEAL_KEY_LEN != 0 {
            return Err(DealboxError::Serialization(format!(
                "registry length {} is not a multiple of {DEAL_KEY_LEN}",
                bytes.len()
            )));
        }
        let slots = bytes
            .chunks_exact(DEAL_KEY_LEN)
            .map(|chunk| {
                if chunk.iter().all(|b| *b == 0) {
                    Ok(None)
                } else {
                    DealKey::from_slice(chunk)
                        .map(Some)
                        .map_err(|e| DealboxError::Serialization(e.to_string()))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { slots })
    }

    fn set(&mut self, index: usize, key: Option<DealKey>) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = key;
        }
    }
}

/// A registration that passed validation and is ready to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryWrite {
    pub account: Address,
    /// Slot actually written (0 when the registry is being allocated).
    pub index: u64,
    pub key: DealKey,
    /// Whether the account's registry box is created by this write.
    pub allocates: bool,
}

/// All account registries.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    registries: HashMap<Address, AccountRegistry>,
    capacity: usize,
}

impl KeyRegistry {
    /// Create an empty registry set whose registries hold `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            registries: HashMap::new(),
            capacity,
        }
    }

    /// Validate a registration without touching state.
    ///
    /// # Errors
    /// - `SlotIndexOutOfRange` if the registry exists and `index` is past its last slot
    /// - `SlotOccupied` if the account's registry exists and the slot is in use
    pub fn plan_register(
        &self,
        account: Address,
        key: DealKey,
        index: u64,
    ) -> Result<RegistryWrite> {
        match self.registries.get(&account) {
            None => Ok(RegistryWrite {
                account,
                index: 0,
                key,
                allocates: true,
            }),
            Some(registry) => {
                if usize::try_from(index).map_or(true, |i| i >= registry.capacity()) {
                    return Err(DealboxError::SlotIndexOutOfRange {
                        index,
                        slots: registry.capacity(),
                    });
                }
                if registry.get(index).is_some() {
                    return Err(DealboxError::SlotOccupied { account, index });
                }
                Ok(RegistryWrite {
                    account,
                    index,
                    key,
                    allocates: false,
                })
            }
        }
    }

    /// Apply a validated registration.
    pub fn apply(&mut self, write: RegistryWrite) {
        let capacity = self.capacity;
        let registry = self
            .registries
            .entry(write.account)
            .or_insert_with(|| AccountRegistry::new(capacity));
        #[allow(clippy::cast_possible_truncation)]
        registry.set(write.index as usize, Some(write.key));
        tracing::debug!(
            account = %write.account,
            slot = write.index,
            deal = %write.key,
            allocated = write.allocates,
            "Deal key registered"
        );
    }

    /// True iff slot `index` of `account` holds exactly `key`.
    #[must_use]
    pub fn confirm(&self, account: &Address, key: &DealKey, index: u64) -> bool {
        self.registries
            .get(account)
            .and_then(|r| r.get(index))
            .is_some_and(|held| held == *key)
    }

    /// Zero slot `index` of `account` if the registry exists. Idempotent.
    pub fn erase(&mut self, account: &Address, index: u64) {
        if let Some(registry) = self.registries.get_mut(account) {
            if let Ok(i) = usize::try_from(index) {
                registry.set(i, None);
            }
        }
    }

    #[must_use]
    pub fn get(&self, account: &Address) -> Option<&AccountRegistry> {
        self.registries.get(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(note: &str) -> DealKey {
        DealKey::derive(&Address::repeat(1), &Address::repeat(2), note).unwrap()
    }

    fn register(reg: &mut KeyRegistry, account: Address, note: &str, index: u64) -> RegistryWrite {
        let write = reg.plan_register(account, key(note), index).unwrap();
        reg.apply(write);
        write
    }

    #[test]
    fn first_registration_allocates_at_slot_zero() {
        let mut reg = KeyRegistry::new(31);
        let a = Address::repeat(1);

        let write = register(&mut reg, a, "k", 5);
        assert!(write.allocates);
        assert_eq!(write.index, 0);
        assert!(reg.confirm(&a, &key("k"), 0));
        assert!(!reg.confirm(&a, &key("k"), 5));
    }

    #[test]
    fn later_registration_uses_given_index_without_allocating() {
        let mut reg = KeyRegistry::new(31);
        let a = Address::repeat(1);
        register(&mut reg, a, "k1", 0);

        let write = register(&mut reg, a, "k2", 3);
        assert!(!write.allocates);
        assert!(reg.confirm(&a, &key("k2"), 3));
    }

    #[test]
    fn planning_leaves_registry_untouched() {
        let reg = KeyRegistry::new(31);
        let a = Address::repeat(1);
        reg.plan_register(a, key("k"), 0).unwrap();
        assert!(reg.get(&a).is_none());
    }

    #[test]
    fn occupied_slot_rejected_without_change() {
        let mut reg = KeyRegistry::new(31);
        let a = Address::repeat(1);
        register(&mut reg, a, "k1", 0);

        let err = reg.plan_register(a, key("k2"), 0).unwrap_err();
        assert_eq!(err, DealboxError::SlotOccupied { account: a, index: 0 });
        assert!(reg.confirm(&a, &key("k1"), 0));
    }

    #[test]
    fn out_of_range_index_rejected() {
        let mut reg = KeyRegistry::new(31);
        let a = Address::repeat(1);
        register(&mut reg, a, "k1", 0);
        let err = reg.plan_register(a, key("k2"), 31).unwrap_err();
        assert!(matches!(err, DealboxError::SlotIndexOutOfRange { index: 31, .. }));
    }

    #[test]
    fn erase_is_idempotent() {
        let mut reg = KeyRegistry::new(31);
        let a = Address::repeat(1);
        register(&mut reg, a, "k", 0);

        reg.erase(&a, 0);
        assert!(!reg.confirm(&a, &key("k"), 0));
        reg.erase(&a, 0);
        reg.erase(&Address::repeat(9), 0);
        // Registry outlives its keys
        assert!(reg.get(&a).unwrap().is_empty());
    }

    #[test]
    fn confirm_missing_registry_is_false() {
        let reg = KeyRegistry::new(31);
        assert!(!reg.confirm(&Address::repeat(1), &key("k"), 0));
    }

    #[test]
    fn persisted_layout() {
        let mut r = AccountRegistry::new(31);
        r.set(2, Some(key("k")));
        let bytes = r.to_bytes();
        assert_eq!(bytes.len(), 1023);
        assert!(bytes[..66].iter().all(|b| *b == 0));
        assert_eq!(&bytes[66..99], key("k").as_bytes());
        assert_eq!(AccountRegistry::from_bytes(&bytes).unwrap(), r);
        assert!(AccountRegistry::from_bytes(&bytes[..1000]).is_err());
    }

    #[test]
    fn occupied_lists_slots_in_order() {
        let mut r = AccountRegistry::new(4);
        r.set(3, Some(key("b")));
        r.set(1, Some(key("a")));
        let listed: Vec<_> = r.occupied().collect();
        assert_eq!(listed, vec![(1, key("a")), (3, key("b"))]);
    }
}
