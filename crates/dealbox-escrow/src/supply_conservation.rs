//! Supply conservation invariant checker.
//!
//! Invariant checked after every commit:
//! ```text
//! ∀ asset: Σ(vault balances) == Σ(funded)
//! ```
//!
//! Deals only move value between accounts (caller → escrow → parties), so
//! any drift between the two sides means a transfer was applied to one
//! account but not its counterpart.

use std::collections::{BTreeMap, BTreeSet};

use dealbox_types::{AssetId, DealboxError, Result};

/// Tracks per-asset funding totals and validates conservation.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    /// Total funded per asset since genesis.
    funded: BTreeMap<AssetId, u64>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record external funds entering the book.
    pub fn record_funding(&mut self, asset: AssetId, amount: u64) {
        let total = self.funded.entry(asset).or_default();
        *total = total.saturating_add(amount);
    }

    /// Expected total supply for an asset.
    #[must_use]
    pub fn expected_supply(&self, asset: AssetId) -> u64 {
        self.funded.get(&asset).copied().unwrap_or(0)
    }

    /// Verify that the actual supply (sum of all balances) matches what
    /// was funded.
    ///
    /// # Errors
    /// Returns [`DealboxError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, asset: AssetId, actual_supply: u64) -> Result<()> {
        let expected = self.expected_supply(asset);
        if actual_supply != expected {
            return Err(DealboxError::SupplyInvariantViolation {
                reason: format!("{asset}: actual supply {actual_supply} != funded {expected}"),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn tracked_assets(&self) -> BTreeSet<AssetId> {
        self.funded.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USD: AssetId = AssetId(7);

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply(USD), 0);
        assert!(sc.verify(USD, 0).is_ok());
    }

    #[test]
    fn funding_accumulates() {
        let mut sc = SupplyConservation::new();
        sc.record_funding(USD, 1000);
        sc.record_funding(USD, 500);
        assert_eq!(sc.expected_supply(USD), 1500);
        assert!(sc.verify(USD, 1500).is_ok());
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new();
        sc.record_funding(AssetId::NATIVE, 10);
        let err = sc.verify(AssetId::NATIVE, 11).unwrap_err();
        assert!(matches!(err, DealboxError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn assets_independent() {
        let mut sc = SupplyConservation::new();
        sc.record_funding(AssetId::NATIVE, 5);
        sc.record_funding(USD, 50_000);
        assert!(sc.verify(AssetId::NATIVE, 5).is_ok());
        assert!(sc.verify(USD, 50_000).is_ok());
        assert_eq!(sc.tracked_assets().len(), 2);
    }
}
