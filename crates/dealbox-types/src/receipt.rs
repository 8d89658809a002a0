//! Results returned by the protocol operations.

use serde::{Deserialize, Serialize};

use crate::DealKey;

/// Fixed confirmation returned by the string-valued operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confirmation {
    /// Unmatched deal withdrawn by its creator.
    Recalled,
    /// Unmatched deal declined by the counterparty.
    Rejected,
    /// Forward amounts overwritten; counterparty must re-confirm.
    Adjusted,
    /// Caller confirmed the current split; counterparty has not yet.
    Agreed,
    /// Both sides confirmed; funds paid out and the deal deleted.
    Disbursed,
}

impl Confirmation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recalled => "Recalled",
            Self::Rejected => "Rejected",
            Self::Adjusted => "Adjusted",
            Self::Agreed => "Agreed",
            Self::Disbursed => "Disbursed",
        }
    }
}

impl std::fmt::Display for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReceipt {
    pub deal_key: DealKey,
    /// Reserve locked by the new deal record's box.
    pub record_reserve: u64,
    /// Reserve locked by registry boxes allocated during this call.
    pub registration_reserve: u64,
}
