//! Fund movements into and out of the escrow.
//!
//! A [`Transfer`] is a companion transfer bundled with a protocol call
//! (deposit, collateral, reserve payment). A [`Payout`] is an outbound
//! transfer the escrow issues when a deal terminates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Address, AssetId};

/// A transfer submitted in the same invocation as a protocol call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub sender: Address,
    pub receiver: Address,
    pub asset: AssetId,
    pub amount: u64,
}

impl Transfer {
    #[must_use]
    pub fn new(sender: Address, receiver: Address, asset: AssetId, amount: u64) -> Self {
        Self {
            sender,
            receiver,
            asset,
            amount,
        }
    }

    /// A native-coin payment.
    #[must_use]
    pub fn native(sender: Address, receiver: Address, amount: u64) -> Self {
        Self::new(sender, receiver, AssetId::NATIVE, amount)
    }
}

/// Why the escrow is paying someone. Rendered as the payout memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutReason {
    /// Full deposit forwarded to the counterparty.
    PaymentForward,
    /// Full deposit returned to its depositor.
    PaymentReturned,
    /// Agreed share of a deposit forwarded to the counterparty.
    PartialPaymentForward,
    /// Remainder of a split deposit returned to its depositor.
    PartialPaymentReturned,
    /// Collateral returned to its depositor after disbursement.
    CollateralReturned,
    /// Unmatched proposal withdrawn by its creator.
    DealRecalled,
    /// Proposal declined by the counterparty.
    DealRejected { by: Address },
}

impl fmt::Display for PayoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentForward => write!(f, "Payment forward"),
            Self::PaymentReturned => write!(f, "Payment returned"),
            Self::PartialPaymentForward => write!(f, "Partial payment forward"),
            Self::PartialPaymentReturned => write!(f, "Partial payment returned"),
            Self::CollateralReturned => write!(f, "Collateral returned"),
            Self::DealRecalled => write!(f, "Deal recalled"),
            Self::DealRejected { by } => write!(f, "Deal rejected by {}", by.to_hex()),
        }
    }
}

/// An outbound transfer from the escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub receiver: Address,
    pub asset: AssetId,
    pub amount: u64,
    pub reason: PayoutReason,
}

impl Payout {
    /// Build a payout, or `None` for a zero amount (zero payouts are never issued).
    #[must_use]
    pub fn non_zero(
        receiver: Address,
        asset: AssetId,
        amount: u64,
        reason: PayoutReason,
    ) -> Option<Self> {
        (amount != 0).then_some(Self {
            receiver,
            asset,
            amount,
            reason,
        })
    }

    /// The memo attached to this payout.
    #[must_use]
    pub fn memo(&self) -> String {
        self.reason.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memos() {
        assert_eq!(PayoutReason::PaymentForward.to_string(), "Payment forward");
        assert_eq!(
            PayoutReason::PartialPaymentReturned.to_string(),
            "Partial payment returned"
        );
        let by = Address::repeat(0xAB);
        assert_eq!(
            PayoutReason::DealRejected { by }.to_string(),
            format!("Deal rejected by {}", "ab".repeat(32))
        );
    }

    #[test]
    fn zero_payout_is_skipped() {
        let to = Address::repeat(1);
        assert!(Payout::non_zero(to, AssetId::NATIVE, 0, PayoutReason::PaymentForward).is_none());
        let p = Payout::non_zero(to, AssetId(3), 5, PayoutReason::CollateralReturned).unwrap();
        assert_eq!(p.memo(), "Collateral returned");
    }

    #[test]
    fn transfer_serde_roundtrip() {
        let t = Transfer::native(Address::repeat(1), Address::repeat(2), 42);
        let json = serde_json::to_string(&t).unwrap();
        let back: Transfer = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
