//! Disbursement: turning a fully agreed deal into payouts.
//!
//! Each side is settled independently:
//!
//! | forward amount      | deposit goes to                          |
//! |---------------------|------------------------------------------|
//! | `== deposit`        | counterparty, in full                    |
//! | `== 0`              | depositor, in full                       |
//! | `0 < f < deposit`   | `f` to counterparty, remainder back      |
//!
//! Collateral always goes back to whoever posted it. Zero-amount payouts
//! are dropped, so the payouts of one deal sum to exactly the four stored
//! amounts.

use dealbox_types::{DealRecord, DealboxError, PartySide, Payout, PayoutReason, Result};

/// Payouts for a deal where both sides confirmed the stored split.
///
/// # Errors
/// Returns `ForwardExceedsDeposit` if a stored forward amount is larger
/// than its deposit. `adjust` never stores such a record.
pub fn disburse(record: &DealRecord) -> Result<Vec<Payout>> {
    let mut payouts = settle_side(&record.first, &record.second)?;
    payouts.extend(settle_side(&record.second, &record.first)?);
    Ok(payouts)
}

fn settle_side(side: &PartySide, counterparty: &PartySide) -> Result<Vec<Payout>> {
    let deposit = side.terms.deposit_amount;
    let forward = side.forward_amount;
    let asset = side.terms.deposit_asset;
    let to_them = counterparty.address;
    let to_me = side.address;

    let deposit_payouts = if forward == deposit {
        vec![Payout::non_zero(to_them, asset, deposit, PayoutReason::PaymentForward)]
    } else if forward == 0 {
        vec![Payout::non_zero(to_me, asset, deposit, PayoutReason::PaymentReturned)]
    } else {
        let returned = deposit
            .checked_sub(forward)
            .ok_or(DealboxError::ForwardExceedsDeposit { forward, deposit })?;
        vec![
            Payout::non_zero(to_them, asset, forward, PayoutReason::PartialPaymentForward),
            Payout::non_zero(to_me, asset, returned, PayoutReason::PartialPaymentReturned),
        ]
    };

    let collateral = Payout::non_zero(
        to_me,
        side.terms.collateral_asset,
        side.terms.collateral_amount,
        PayoutReason::CollateralReturned,
    );

    Ok(deposit_payouts
        .into_iter()
        .chain(std::iter::once(collateral))
        .flatten()
        .collect())
}

/// Refund everything one side posted, under a single memo.
pub(crate) fn refund(side: &PartySide, reason: PayoutReason) -> Vec<Payout> {
    [
        Payout::non_zero(side.address, side.terms.deposit_asset, side.terms.deposit_amount, reason),
        Payout::non_zero(
            side.address,
            side.terms.collateral_asset,
            side.terms.collateral_amount,
            reason,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
}
