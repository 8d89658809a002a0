//! Storage-cost accounting.
//!
//! Every box allocation locks a deterministic minimum reserve:
//! ```text
//! cost = flat + per_byte × (box_len + key_len)
//! ```
//! Operations that may allocate boxes sum the cost of the boxes they
//! actually create in a [`CostAccumulator`] and check it against the
//! funding bundled with the call. Overfunding is accepted; the excess is
//! not returned.

use dealbox_types::{DealboxError, EscrowConfig, Result, constants};

/// Computes reserve costs for each kind of box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCostAccountant {
    flat: u64,
    per_byte: u64,
    registry_box_len: usize,
}

impl StorageCostAccountant {
    #[must_use]
    pub fn new(config: &EscrowConfig) -> Self {
        Self {
            flat: config.box_flat_cost,
            per_byte: config.box_byte_cost,
            registry_box_len: config.registry_box_len(),
        }
    }

    /// Reserve for a box of `box_len` bytes stored under a `key_len`-byte key.
    #[must_use]
    pub fn box_cost(&self, box_len: u64, key_len: u64) -> u64 {
        self.per_byte
            .saturating_mul(box_len.saturating_add(key_len))
            .saturating_add(self.flat)
    }

    /// Reserve for one account registry box.
    #[must_use]
    pub fn registry_cost(&self) -> u64 {
        self.box_cost(
            self.registry_box_len as u64,
            constants::REGISTRY_KEY_LEN as u64,
        )
    }

    /// Reserve for a deal record box of the given encoded length.
    #[must_use]
    pub fn record_cost(&self, encoded_len: usize) -> u64 {
        self.box_cost(encoded_len as u64, constants::DEAL_KEY_LEN as u64)
    }

    /// Reserve for a side-data box of the given declared length.
    #[must_use]
    pub fn side_data_cost(&self, declared_len: u64) -> u64 {
        self.box_cost(declared_len, constants::SIDE_DATA_KEY_LEN as u64)
    }
}

/// Running total of reserve owed for boxes created during one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostAccumulator {
    total: u64,
    boxes: usize,
}

impl CostAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the cost of one newly created box.
    pub fn charge(&mut self, cost: u64) {
        self.total = self.total.saturating_add(cost);
        self.boxes += 1;
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of boxes charged.
    #[must_use]
    pub fn boxes(&self) -> usize {
        self.boxes
    }

    /// Check that `provided` covers everything charged so far.
    ///
    /// # Errors
    /// Returns [`DealboxError::InsufficientReserve`] if `provided < total`.
    pub fn verify_covered(&self, provided: u64) -> Result<()> {
        if provided < self.total {
            return Err(DealboxError::InsufficientReserve {
                required: self.total,
                provided,
            });
        }
        Ok(())
    }
}
