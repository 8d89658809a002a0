//! Global deal counters.

use serde::{Deserialize, Serialize};

use dealbox_types::{DealboxError, Result};

/// Aggregate counts across all deals.
///
/// `total_deals` and `active_deals` rise when a deal is matched;
/// disbursement moves one deal from active to completed. Recalled and
/// rejected deals were never matched and leave the counters alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealCounters {
    pub total_deals: u64,
    pub active_deals: u64,
    pub completed_deals: u64,
}

impl DealCounters {
    /// Counters after one more deal is matched.
    #[must_use]
    pub fn matched(self) -> Self {
        Self {
            total_deals: self.total_deals.saturating_add(1),
            active_deals: self.active_deals.saturating_add(1),
            ..self
        }
    }

    /// Counters after one active deal is disbursed.
    ///
    /// # Errors
    /// Returns `CounterUnderflow` if no deal is active.
    pub fn completed(self) -> Result<Self> {
        let active_deals = self
            .active_deals
            .checked_sub(1)
            .ok_or(DealboxError::CounterUnderflow {
                counter: "active_deals",
            })?;
        Ok(Self {
            active_deals,
            completed_deals: self.completed_deals.saturating_add(1),
            ..self
        })
    }
}
