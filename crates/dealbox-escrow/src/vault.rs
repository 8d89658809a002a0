//! Account book for every asset the escrow touches.
//!
//! Tracks one balance per `(account, asset)`, the escrow account included.
//! Funds enter only through [`Vault::fund`]; every other mutation moves
//! value between two accounts, so the per-asset total only changes on
//! funding.

use std::collections::{BTreeSet, HashMap};

use dealbox_types::{Address, AssetId, DealboxError, Payout, Result, Transfer};

/// Per-(account, asset) balances.
#[derive(Debug, Clone, Default)]
pub struct Vault {
    balances: HashMap<(Address, AssetId), u64>,
}

impl Vault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring external funds into the book.
    pub fn fund(&mut self, account: Address, asset: AssetId, amount: u64) {
        let entry = self.balances.entry((account, asset)).or_default();
        *entry = entry.saturating_add(amount);
    }

    #[must_use]
    pub fn balance(&self, account: &Address, asset: AssetId) -> u64 {
        self.balances.get(&(*account, asset)).copied().unwrap_or(0)
    }

    /// Check that each sender holds the sum of everything it sends.
    ///
    /// Several transfers from one sender in the same asset are checked
    /// together.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` for the first sender/asset that falls short.
    pub fn ensure_covers<'a>(
        &self,
        transfers: impl IntoIterator<Item = &'a Transfer>,
    ) -> Result<()> {
        let mut needed: HashMap<(Address, AssetId), u64> = HashMap::new();
        for t in transfers {
            let total = needed.entry((t.sender, t.asset)).or_default();
            *total = total.checked_add(t.amount).ok_or_else(|| {
                DealboxError::invalid("transfer amounts overflow u64")
            })?;
        }
        for ((sender, asset), amount) in needed {
            let available = self.balance(&sender, asset);
            if available < amount {
                return Err(DealboxError::InsufficientBalance {
                    needed: amount,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Move value for a transfer already checked by [`Vault::ensure_covers`].
    pub fn apply_transfer(&mut self, transfer: &Transfer) {
        self.shift(transfer.sender, transfer.receiver, transfer.asset, transfer.amount);
    }

    /// Pay out of `escrow`.
    pub fn apply_payout(&mut self, escrow: Address, payout: &Payout) {
        self.shift(escrow, payout.receiver, payout.asset, payout.amount);
        tracing::debug!(
            receiver = %payout.receiver,
            asset = %payout.asset,
            amount = payout.amount,
            memo = %payout.reason,
            "Payout issued"
        );
    }

    fn shift(&mut self, from: Address, to: Address, asset: AssetId, amount: u64) {
        let source = self.balances.entry((from, asset)).or_default();
        *source = source.saturating_sub(amount);
        let dest = self.balances.entry((to, asset)).or_default();
        *dest = dest.saturating_add(amount);
    }

    /// Sum of all balances of one asset.
    #[must_use]
    pub fn total_supply(&self, asset: AssetId) -> u64 {
        self.balances
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .map(|(_, amount)| *amount)
            .fold(0u64, u64::saturating_add)
    }

    /// Every asset that has ever had a balance entry.
    #[must_use]
    pub fn assets(&self) -> BTreeSet<AssetId> {
        self.balances.keys().map(|(_, asset)| *asset).collect()
    }
}
