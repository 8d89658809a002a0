//! Inputs of the protocol calls.
//!
//! A request bundles the call's arguments with the fund transfers
//! submitted alongside it; the whole bundle succeeds or fails together.

use serde::{Deserialize, Serialize};

use dealbox_types::{Address, DealKey, DealTerms, Transfer};

/// Open a deal with `counterparty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub caller: Address,
    pub counterparty: Address,
    /// Slot for the deal key in the caller's registry.
    pub caller_index: u64,
    /// Slot for the deal key in the counterparty's registry.
    pub counterparty_index: u64,
    pub caller_terms: DealTerms,
    pub counterparty_terms: DealTerms,
    pub note: String,
    /// Caller's deposit, paid to the escrow.
    pub deposit: Transfer,
    /// Caller's collateral, paid to the escrow.
    pub collateral: Transfer,
    /// Native-coin payment covering the reserve of the boxes this call creates.
    pub reserve: Transfer,
}

/// Identifies an existing deal from one party's point of view, together
/// with the registry slots both parties hold its key in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRef {
    pub caller: Address,
    pub counterparty: Address,
    pub deal_key: DealKey,
    pub caller_index: u64,
    pub counterparty_index: u64,
}

impl DealRef {
    /// The same deal seen from the counterparty.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            caller: self.counterparty,
            counterparty: self.caller,
            deal_key: self.deal_key,
            caller_index: self.counterparty_index,
            counterparty_index: self.caller_index,
        }
    }
}

/// Counterparty accepts a proposed deal, posting its own funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub deal: DealRef,
    pub deposit: Transfer,
    pub collateral: Transfer,
}

/// Write one chunk of the caller's side data for a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachRequest {
    pub caller: Address,
    pub deal_key: DealKey,
    pub caller_index: u64,
    pub offset: u64,
    /// Total box length, used only when the box is created by this call.
    pub declared_len: u64,
    pub chunk: Vec<u8>,
}
