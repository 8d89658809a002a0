//! Per-party deal transitions.
//!
//! Every transition is written once, in terms of the caller's role
//! (`mine`) and the other party's role (`theirs`), and works on a borrowed
//! record: it either returns the next version of the record (or the
//! payouts that end it) or fails without side effects.
//!
//! | call   | mine          | theirs        | result                                  |
//! |--------|---------------|---------------|-----------------------------------------|
//! | match  | ABSENT        | PROPOSED      | both LOCKED                             |
//! | adjust | LOCKED / FWD  | LOCKED / FWD  | mine FWD, theirs LOCKED, new forwards   |
//! | agree  | LOCKED        | LOCKED        | mine FWD                                |
//! | agree  | LOCKED        | FWD           | disbursement                            |
//! | recall | PROPOSED      | ABSENT        | my funds refunded                       |
//! | reject | ABSENT        | PROPOSED      | their funds refunded                    |
//! | attach | any but ABSENT| any           | my data flag set                        |

use dealbox_types::{
    Address, DealRecord, DealStatus, DealboxError, Payout, PayoutReason, Result, Role,
};

use crate::disbursement;

/// The caller's role and the counterparty's role in one deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    pub mine: Role,
    pub theirs: Role,
}

impl Parties {
    /// Resolve `caller` and `counterparty` against the recorded parties.
    ///
    /// # Errors
    /// Returns `NotAParty` naming whichever address is not the expected party.
    pub fn resolve(record: &DealRecord, caller: &Address, counterparty: &Address) -> Result<Self> {
        let mine = record
            .role_of(caller)
            .ok_or(DealboxError::NotAParty(*caller))?;
        let theirs = mine.other();
        if record.side(theirs).address != *counterparty {
            return Err(DealboxError::NotAParty(*counterparty));
        }
        Ok(Self { mine, theirs })
    }

    /// Resolve only the caller, for calls that name no counterparty.
    ///
    /// # Errors
    /// Returns `NotAParty` if `caller` is neither recorded party.
    pub fn of_caller(record: &DealRecord, caller: &Address) -> Result<Self> {
        let mine = record
            .role_of(caller)
            .ok_or(DealboxError::NotAParty(*caller))?;
        Ok(Self {
            mine,
            theirs: mine.other(),
        })
    }
}

/// What `agree` leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgreeOutcome {
    /// Caller confirmed; record updated, counterparty still to confirm.
    Confirmed(DealRecord),
    /// Both confirmed; the deal ends with these payouts.
    Disburse(Vec<Payout>),
}

fn require(
    operation: &'static str,
    record: &DealRecord,
    parties: Parties,
    mine_ok: &[DealStatus],
    theirs_ok: &[DealStatus],
) -> Result<()> {
    let mine = record.side(parties.mine).status;
    let theirs = record.side(parties.theirs).status;
    if mine_ok.contains(&mine) && theirs_ok.contains(&theirs) {
        Ok(())
    } else {
        Err(DealboxError::InvalidStatus {
            operation,
            mine,
            theirs,
        })
    }
}

/// Counterparty accepts the proposal.
pub fn match_deal(record: &DealRecord, parties: Parties) -> Result<DealRecord> {
    require(
        "match",
        record,
        parties,
        &[DealStatus::Absent],
        &[DealStatus::Proposed],
    )?;
    let mut next = record.clone();
    next.side_mut(parties.mine).status = DealStatus::Locked;
    next.side_mut(parties.theirs).status = DealStatus::Locked;
    Ok(next)
}

/// Overwrite both forward amounts (given in first/second order).
///
/// The caller is taken to confirm the new split; any earlier confirmation
/// by the counterparty is cleared.
pub fn adjust(
    record: &DealRecord,
    parties: Parties,
    first_forward: u64,
    second_forward: u64,
) -> Result<DealRecord> {
    const NEGOTIATING: &[DealStatus] = &[DealStatus::Locked, DealStatus::ForwardProposed];
    require("adjust", record, parties, NEGOTIATING, NEGOTIATING)?;

    for (forward, side) in [(first_forward, &record.first), (second_forward, &record.second)] {
        let deposit = side.terms.deposit_amount;
        if forward > deposit {
            return Err(DealboxError::ForwardExceedsDeposit { forward, deposit });
        }
    }

    let mut next = record.clone();
    next.first.forward_amount = first_forward;
    next.second.forward_amount = second_forward;
    next.side_mut(parties.mine).status = DealStatus::ForwardProposed;
    next.side_mut(parties.theirs).status = DealStatus::Locked;
    Ok(next)
}

/// Confirm the stored split.
pub fn agree(record: &DealRecord, parties: Parties) -> Result<AgreeOutcome> {
    require(
        "agree",
        record,
        parties,
        &[DealStatus::Locked],
        &[DealStatus::Locked, DealStatus::ForwardProposed],
    )?;
    if record.side(parties.theirs).status == DealStatus::ForwardProposed {
        return disbursement::disburse(record).map(AgreeOutcome::Disburse);
    }
    let mut next = record.clone();
    next.side_mut(parties.mine).status = DealStatus::ForwardProposed;
    Ok(AgreeOutcome::Confirmed(next))
}

/// Proposer withdraws an unmatched deal.
pub fn recall(record: &DealRecord, parties: Parties) -> Result<Vec<Payout>> {
    require(
        "recall",
        record,
        parties,
        &[DealStatus::Proposed],
        &[DealStatus::Absent],
    )?;
    Ok(disbursement::refund(
        record.side(parties.mine),
        PayoutReason::DealRecalled,
    ))
}

/// Counterparty declines an unmatched deal; the proposer is refunded.
pub fn reject(record: &DealRecord, parties: Parties) -> Result<Vec<Payout>> {
    require(
        "reject",
        record,
        parties,
        &[DealStatus::Absent],
        &[DealStatus::Proposed],
    )?;
    let by = record.side(parties.mine).address;
    Ok(disbursement::refund(
        record.side(parties.theirs),
        PayoutReason::DealRejected { by },
    ))
}

/// Mark that the caller has side data for this deal.
pub fn attach(record: &DealRecord, parties: Parties) -> Result<DealRecord> {
    let mine = record.side(parties.mine).status;
    if !mine.is_participating() {
        return Err(DealboxError::InvalidStatus {
            operation: "attach",
            mine,
            theirs: record.side(parties.theirs).status,
        });
    }
    let mut next = record.clone();
    next.side_mut(parties.mine).has_data = true;
    Ok(next)
}
