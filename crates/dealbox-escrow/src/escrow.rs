//! The escrow service.
//!
//! [`DealEscrow`] owns every piece of state (registries, records, side
//! data, counters, the vault) and exposes the protocol calls. Each call is
//! planned against `&self` into a [`Changeset`], then committed:
//!
//! ```text
//! request ─▶ plan_*() ──Err──▶ warn!, state untouched
//!                │
//!                └─Ok(Changeset)─▶ commit() ─▶ CommitLog, info!
//! ```

use std::collections::BTreeMap;

use dealbox_store::{
    CostAccumulator, DealCounters, DealStore, KeyRegistry, SideDataKey, SideDataStore,
    StorageCostAccountant,
};
use dealbox_types::{
    Address, AssetId, Confirmation, CreateReceipt, DealKey, DealRecord, DealboxError,
    EscrowConfig, Payout, Result, Transfer,
};

use crate::changeset::{Changeset, CommitEntry, CommitLog, Operation, RecordChange};
use crate::lifecycle::{self, AgreeOutcome, Parties};
use crate::request::{AttachRequest, CreateRequest, DealRef, MatchRequest};
use crate::supply_conservation::SupplyConservation;
use crate::vault::Vault;

/// Single-writer escrow instance.
#[derive(Debug, Clone)]
pub struct DealEscrow {
    config: EscrowConfig,
    accountant: StorageCostAccountant,
    registry: KeyRegistry,
    deals: DealStore,
    side_data: SideDataStore,
    counters: DealCounters,
    vault: Vault,
    supply: SupplyConservation,
    log: CommitLog,
    /// Escrow holdings not owed to any live deal (reserve payments, direct funding).
    unallocated: BTreeMap<AssetId, u64>,
}

impl DealEscrow {
    /// Create an empty escrow.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` does not validate.
    pub fn new(config: EscrowConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            escrow = %config.escrow_address,
            registry_slots = config.registry_slots,
            "Escrow initialised"
        );
        Ok(Self {
            accountant: StorageCostAccountant::new(&config),
            registry: KeyRegistry::new(config.registry_slots),
            deals: DealStore::new(),
            side_data: SideDataStore::new(),
            counters: DealCounters::default(),
            vault: Vault::new(),
            supply: SupplyConservation::new(),
            log: CommitLog::new(),
            unallocated: BTreeMap::new(),
            config,
        })
    }

    // =================================================================
    // Protocol calls
    // =================================================================

    /// Propose a deal. Returns the reserve locked by the new record and
    /// by any registries allocated on the way.
    pub fn create(&mut self, request: &CreateRequest) -> Result<CreateReceipt> {
        let (changeset, receipt) = self
            .plan_create(request)
            .map_err(|e| rejected(Operation::Create, None, e))?;
        self.commit(changeset);
        Ok(receipt)
    }

    /// Write a chunk of side data. Returns the reserve of the side-data
    /// box if this call created it, otherwise 0.
    pub fn attach(&mut self, request: &AttachRequest) -> Result<u64> {
        let (changeset, reserve) = self
            .plan_attach(request)
            .map_err(|e| rejected(Operation::Attach, Some(&request.deal_key), e))?;
        self.commit(changeset);
        Ok(reserve)
    }

    /// Accept a proposal. Returns the persisted status pair afterwards.
    pub fn match_deal(&mut self, request: &MatchRequest) -> Result<[u8; 2]> {
        let (changeset, statuses) = self
            .plan_match(request)
            .map_err(|e| rejected(Operation::Match, Some(&request.deal.deal_key), e))?;
        self.commit(changeset);
        Ok(statuses)
    }

    /// Withdraw an unmatched proposal.
    pub fn recall(&mut self, deal: &DealRef) -> Result<Confirmation> {
        let changeset = self
            .plan_termination(Operation::Recall, deal, lifecycle::recall)
            .map_err(|e| rejected(Operation::Recall, Some(&deal.deal_key), e))?;
        self.commit(changeset);
        Ok(Confirmation::Recalled)
    }

    /// Decline an unmatched proposal.
    pub fn reject(&mut self, deal: &DealRef) -> Result<Confirmation> {
        let changeset = self
            .plan_termination(Operation::Reject, deal, lifecycle::reject)
            .map_err(|e| rejected(Operation::Reject, Some(&deal.deal_key), e))?;
        self.commit(changeset);
        Ok(Confirmation::Rejected)
    }

    /// Replace both forward amounts (first/second order).
    pub fn adjust(
        &mut self,
        deal: &DealRef,
        first_forward: u64,
        second_forward: u64,
    ) -> Result<Confirmation> {
        let changeset = self
            .plan_adjust(deal, first_forward, second_forward)
            .map_err(|e| rejected(Operation::Adjust, Some(&deal.deal_key), e))?;
        self.commit(changeset);
        Ok(Confirmation::Adjusted)
    }

    /// Confirm the stored split; disburses once both sides have.
    pub fn agree(&mut self, deal: &DealRef) -> Result<Confirmation> {
        let (changeset, outcome) = self
            .plan_agree(deal)
            .map_err(|e| rejected(Operation::Agree, Some(&deal.deal_key), e))?;
        self.commit(changeset);
        Ok(outcome)
    }

    /// Bring external funds into an account.
    pub fn fund(&mut self, account: Address, asset: AssetId, amount: u64) {
        self.vault.fund(account, asset, amount);
        self.supply.record_funding(asset, amount);
        if account == self.config.escrow_address {
            add(&mut self.unallocated, asset, amount);
        }
        tracing::info!(account = %account, asset = %asset, amount, "Account funded");
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    #[must_use]
    pub fn deal(&self, key: &DealKey) -> Option<&DealRecord> {
        self.deals.get(key)
    }

    /// The record under `key` in its persisted byte layout.
    pub fn deal_bytes(&self, key: &DealKey) -> Result<Option<Vec<u8>>> {
        self.deals.encoded(key)
    }

    /// Occupied registry slots of `account`, in slot order.
    #[must_use]
    pub fn registry_slots(&self, account: &Address) -> Vec<(u64, DealKey)> {
        self.registry
            .get(account)
            .map(|r| r.occupied().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn side_data(&self, account: &Address, key: &DealKey) -> Option<&[u8]> {
        self.side_data.get(&SideDataKey::for_deal(*account, key))
    }

    #[must_use]
    pub fn counters(&self) -> DealCounters {
        self.counters
    }

    #[must_use]
    pub fn balance(&self, account: &Address, asset: AssetId) -> u64 {
        self.vault.balance(account, asset)
    }

    #[must_use]
    pub fn commit_log(&self) -> &CommitLog {
        &self.log
    }

    /// Number of live deals.
    #[must_use]
    pub fn deal_count(&self) -> usize {
        self.deals.len()
    }

    /// Check that every asset's total balance equals what was funded.
    ///
    /// # Errors
    /// Returns `SupplyInvariantViolation` for the first asset that drifted.
    pub fn verify_supply(&self) -> Result<()> {
        let mut assets = self.supply.tracked_assets();
        assets.extend(self.vault.assets());
        for asset in assets {
            self.supply.verify(asset, self.vault.total_supply(asset))?;
        }
        Ok(())
    }

    /// Check that the escrow holds exactly what live deals have posted,
    /// plus its unallocated holdings.
    ///
    /// # Errors
    /// Returns `SupplyInvariantViolation` for the first asset that differs.
    pub fn verify_escrow_backing(&self) -> Result<()> {
        let mut owed = self.unallocated.clone();
        for (_, record) in self.deals.iter() {
            for side in [&record.first, &record.second] {
                if side.status.is_participating() {
                    add(&mut owed, side.terms.deposit_asset, side.terms.deposit_amount);
                    add(&mut owed, side.terms.collateral_asset, side.terms.collateral_amount);
                }
            }
        }
        let escrow = self.config.escrow_address;
        let mut assets = self.vault.assets();
        assets.extend(owed.keys().copied());
        for asset in assets {
            let held = self.vault.balance(&escrow, asset);
            let expected = owed.get(&asset).copied().unwrap_or(0);
            if held != expected {
                return Err(DealboxError::SupplyInvariantViolation {
                    reason: format!("escrow holds {held} of {asset}, deals account for {expected}"),
                });
            }
        }
        Ok(())
    }

    // =================================================================
    // Planning
    // =================================================================

    fn plan_create(&self, req: &CreateRequest) -> Result<(Changeset, CreateReceipt)> {
        if req.note.len() > self.config.max_note_len {
            return Err(DealboxError::NoteTooLong {
                len: req.note.len(),
                max: self.config.max_note_len,
            });
        }
        let escrow = self.config.escrow_address;
        if req.caller == escrow || req.counterparty == escrow {
            return Err(DealboxError::invalid("the escrow account cannot be a party"));
        }
        let key = DealKey::derive(&req.caller, &req.counterparty, &req.note)?;
        if self.deals.contains(&key) {
            return Err(DealboxError::DealAlreadyExists(key));
        }

        let terms = &req.caller_terms;
        self.check_funding(
            "deposit",
            &req.deposit,
            &req.caller,
            terms.deposit_asset,
            terms.deposit_amount,
        )?;
        self.check_funding(
            "collateral",
            &req.collateral,
            &req.caller,
            terms.collateral_asset,
            terms.collateral_amount,
        )?;

        let record = DealRecord::propose(
            req.caller,
            req.caller_terms,
            req.counterparty,
            req.counterparty_terms,
            req.note.clone(),
        );
        let record_reserve = self.accountant.record_cost(record.encoded_len());

        let mut registrations = CostAccumulator::new();
        let mine = self.registry.plan_register(req.caller, key, req.caller_index)?;
        let theirs = self
            .registry
            .plan_register(req.counterparty, key, req.counterparty_index)?;
        for write in [&mine, &theirs] {
            if write.allocates {
                registrations.charge(self.accountant.registry_cost());
            }
        }

        let mut costs = registrations;
        costs.charge(record_reserve);
        self.check_funding(
            "reserve",
            &req.reserve,
            &req.caller,
            AssetId::NATIVE,
            req.reserve.amount,
        )?;
        costs.verify_covered(req.reserve.amount)?;

        let inbound = vec![req.deposit, req.collateral, req.reserve];
        self.vault.ensure_covers(&inbound)?;

        let mut changeset = Changeset::new(Operation::Create, key, RecordChange::Insert(record));
        changeset.registry_writes = vec![mine, theirs];
        changeset.inbound = inbound;
        changeset.reserve_received = req.reserve.amount;

        let receipt = CreateReceipt {
            deal_key: key,
            record_reserve,
            registration_reserve: registrations.total(),
        };
        Ok((changeset, receipt))
    }

    fn plan_attach(&self, req: &AttachRequest) -> Result<(Changeset, u64)> {
        self.confirm_slot(&req.caller, &req.deal_key, req.caller_index)?;
        let record = self.deals.require(&req.deal_key)?;
        let parties = Parties::of_caller(record, &req.caller)?;
        let next = lifecycle::attach(record, parties)?;

        let write = self.side_data.plan_write(
            SideDataKey::for_deal(req.caller, &req.deal_key),
            req.declared_len,
            req.offset,
            &req.chunk,
            self.config.max_side_data_len,
        )?;
        let mut costs = CostAccumulator::new();
        if let Some(len) = write.allocates {
            costs.charge(self.accountant.side_data_cost(len));
        }
        costs.verify_covered(next.side(parties.mine).terms.native_value())?;

        let mut changeset =
            Changeset::new(Operation::Attach, req.deal_key, RecordChange::Update(next));
        changeset.side_data_write = Some(write);
        Ok((changeset, costs.total()))
    }

    fn plan_match(&self, req: &MatchRequest) -> Result<(Changeset, [u8; 2])> {
        let deal = &req.deal;
        let (record, parties) = self.load(deal)?;
        let next = lifecycle::match_deal(record, parties)?;

        let terms = next.side(parties.mine).terms;
        self.check_funding(
            "deposit",
            &req.deposit,
            &deal.caller,
            terms.deposit_asset,
            terms.deposit_amount,
        )?;
        self.check_funding(
            "collateral",
            &req.collateral,
            &deal.caller,
            terms.collateral_asset,
            terms.collateral_amount,
        )?;
        let inbound = vec![req.deposit, req.collateral];
        self.vault.ensure_covers(&inbound)?;

        let statuses = next.status_bytes();
        let mut changeset =
            Changeset::new(Operation::Match, deal.deal_key, RecordChange::Update(next));
        changeset.inbound = inbound;
        changeset.counters = Some(self.counters.matched());
        Ok((changeset, statuses))
    }

    fn plan_adjust(
        &self,
        deal: &DealRef,
        first_forward: u64,
        second_forward: u64,
    ) -> Result<Changeset> {
        let (record, parties) = self.load(deal)?;
        let next = lifecycle::adjust(record, parties, first_forward, second_forward)?;
        Ok(Changeset::new(Operation::Adjust, deal.deal_key, RecordChange::Update(next)))
    }

    fn plan_agree(&self, deal: &DealRef) -> Result<(Changeset, Confirmation)> {
        let (record, parties) = self.load(deal)?;
        match lifecycle::agree(record, parties)? {
            AgreeOutcome::Confirmed(next) => Ok((
                Changeset::new(Operation::Agree, deal.deal_key, RecordChange::Update(next)),
                Confirmation::Agreed,
            )),
            AgreeOutcome::Disburse(payouts) => {
                let mut changeset = self.close(Operation::Agree, deal, payouts)?;
                changeset.counters = Some(self.counters.completed()?);
                Ok((changeset, Confirmation::Disbursed))
            }
        }
    }

    fn plan_termination(
        &self,
        operation: Operation,
        deal: &DealRef,
        transition: fn(&DealRecord, Parties) -> Result<Vec<Payout>>,
    ) -> Result<Changeset> {
        let (record, parties) = self.load(deal)?;
        let payouts = transition(record, parties)?;
        self.close(operation, deal, payouts)
    }

    /// Changeset that ends a deal: record, both registry slots and both
    /// side-data boxes go, and the payouts leave the escrow.
    fn close(
        &self,
        operation: Operation,
        deal: &DealRef,
        payouts: Vec<Payout>,
    ) -> Result<Changeset> {
        let escrow = self.config.escrow_address;
        let outbound: Vec<Transfer> = payouts
            .iter()
            .map(|p| Transfer::new(escrow, p.receiver, p.asset, p.amount))
            .collect();
        self.vault.ensure_covers(&outbound)?;

        let mut changeset = Changeset::new(operation, deal.deal_key, RecordChange::Delete);
        changeset.registry_erasures = vec![
            (deal.caller, deal.caller_index),
            (deal.counterparty, deal.counterparty_index),
        ];
        changeset.side_data_removals = vec![
            SideDataKey::for_deal(deal.caller, &deal.deal_key),
            SideDataKey::for_deal(deal.counterparty, &deal.deal_key),
        ];
        changeset.payouts = payouts;
        Ok(changeset)
    }

    /// Registry confirmation for both parties, then the record and the
    /// caller's role in it.
    fn load(&self, deal: &DealRef) -> Result<(&DealRecord, Parties)> {
        self.confirm_slot(&deal.caller, &deal.deal_key, deal.caller_index)?;
        self.confirm_slot(&deal.counterparty, &deal.deal_key, deal.counterparty_index)?;
        let record = self.deals.require(&deal.deal_key)?;
        let parties = Parties::resolve(record, &deal.caller, &deal.counterparty)?;
        Ok((record, parties))
    }

    fn confirm_slot(&self, account: &Address, key: &DealKey, index: u64) -> Result<()> {
        if self.registry.confirm(account, key, index) {
            Ok(())
        } else {
            Err(DealboxError::RegistryMismatch {
                account: *account,
                index,
            })
        }
    }

    fn check_funding(
        &self,
        what: &str,
        transfer: &Transfer,
        caller: &Address,
        asset: AssetId,
        amount: u64,
    ) -> Result<()> {
        if transfer.sender != *caller {
            return Err(DealboxError::funding(format!("{what} sender is not the caller")));
        }
        if transfer.receiver != self.config.escrow_address {
            return Err(DealboxError::funding(format!("{what} receiver is not the escrow")));
        }
        if transfer.asset != asset {
            return Err(DealboxError::funding(format!(
                "{what} asset {} != expected {asset}",
                transfer.asset
            )));
        }
        if transfer.amount != amount {
            return Err(DealboxError::funding(format!(
                "{what} amount {} != expected {amount}",
                transfer.amount
            )));
        }
        Ok(())
    }

    // =================================================================
    // Commit
    // =================================================================

    fn commit(&mut self, changeset: Changeset) -> &CommitEntry {
        let key = changeset.deal_key;
        match &changeset.record {
            RecordChange::Insert(record) | RecordChange::Update(record) => {
                self.deals.put(key, record.clone());
            }
            RecordChange::Delete => {
                self.deals.remove(&key);
            }
        }
        for write in &changeset.registry_writes {
            self.registry.apply(*write);
        }
        for (account, index) in &changeset.registry_erasures {
            self.registry.erase(account, *index);
        }
        if let Some(write) = &changeset.side_data_write {
            self.side_data.apply_write(write.clone());
        }
        for side_key in &changeset.side_data_removals {
            self.side_data.remove(side_key);
        }
        if let Some(counters) = changeset.counters {
            self.counters = counters;
        }

        let escrow = self.config.escrow_address;
        for transfer in &changeset.inbound {
            self.vault.apply_transfer(transfer);
        }
        add(&mut self.unallocated, AssetId::NATIVE, changeset.reserve_received);
        for payout in &changeset.payouts {
            self.vault.apply_payout(escrow, payout);
        }

        if let Err(e) = self.verify_supply() {
            tracing::error!(deal = %key, error = %e, "Supply conservation broken after commit");
        }

        let entry = self.log.append(&changeset);
        tracing::info!(
            operation = %entry.operation,
            deal = %entry.deal_key,
            sequence = entry.sequence,
            commit = %entry.id,
            payouts = entry.payouts,
            "Changeset committed"
        );
        entry
    }
}

fn add(totals: &mut BTreeMap<AssetId, u64>, asset: AssetId, amount: u64) {
    if amount > 0 {
        let total = totals.entry(asset).or_default();
        *total = total.saturating_add(amount);
    }
}

fn rejected(operation: Operation, deal: Option<&DealKey>, error: DealboxError) -> DealboxError {
    match deal {
        Some(key) => tracing::warn!(%operation, deal = %key, %error, "Operation rejected"),
        None => tracing::warn!(%operation, %error, "Operation rejected"),
    }
    error
}

#[cfg(test)]
mod tests {
    use dealbox_types::{DealStatus, DealTerms};

    use super::*;

    fn escrow() -> DealEscrow {
        DealEscrow::new(EscrowConfig::default()).unwrap()
    }

    fn a() -> Address {
        Address::repeat(0xA0)
    }
    fn b() -> Address {
        Address::repeat(0x0B)
    }

    fn create_request(e: &DealEscrow, reserve: u64) -> CreateRequest {
        let to = e.config().escrow_address;
        CreateRequest {
            caller: a(),
            counterparty: b(),
            caller_index: 0,
            counterparty_index: 0,
            caller_terms: DealTerms::native(100, 10),
            counterparty_terms: DealTerms::native(100, 10),
            note: "swap1".into(),
            deposit: Transfer::native(a(), to, 100),
            collateral: Transfer::native(a(), to, 10),
            reserve: Transfer::native(a(), to, reserve),
        }
    }

    fn full_reserve(e: &DealEscrow) -> u64 {
        e.accountant.record_cost(152 + 5) + 2 * e.accountant.registry_cost()
    }

    #[test]
    fn create_reports_reserves() {
        let mut e = escrow();
        e.fund(a(), AssetId::NATIVE, 10_000_000);
        let reserve = full_reserve(&e);
        let receipt = e.create(&create_request(&e, reserve)).unwrap();
        assert_eq!(receipt.record_reserve, 78_500);
        assert_eq!(receipt.registration_reserve, 2 * 424_500);
        assert_eq!(e.deal(&receipt.deal_key).unwrap().status_bytes(), [1, 0]);
        assert_eq!(e.commit_log().len(), 1);
    }

    #[test]
    fn funding_mismatch_leaves_no_trace() {
        let mut e = escrow();
        e.fund(a(), AssetId::NATIVE, 10_000_000);
        let mut req = create_request(&e, full_reserve(&e));
        req.deposit.amount = 99;
        let err = e.create(&req).unwrap_err();
        assert!(matches!(err, DealboxError::FundingMismatch { .. }));
        assert_eq!(e.deal_count(), 0);
        assert!(e.registry_slots(&a()).is_empty());
        assert_eq!(e.balance(&a(), AssetId::NATIVE), 10_000_000);
        assert!(e.commit_log().is_empty());
    }

    #[test]
    fn caller_without_funds_is_rejected() {
        let mut e = escrow();
        e.fund(a(), AssetId::NATIVE, 50);
        let err = e.create(&create_request(&e, full_reserve(&e))).unwrap_err();
        assert!(matches!(err, DealboxError::InsufficientBalance { .. }));
    }

    #[test]
    fn escrow_cannot_be_a_party() {
        let mut e = escrow();
        let mut req = create_request(&e, full_reserve(&e));
        req.counterparty = e.config().escrow_address;
        assert!(matches!(
            e.create(&req).unwrap_err(),
            DealboxError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn stale_index_is_registry_mismatch() {
        let mut e = escrow();
        e.fund(a(), AssetId::NATIVE, 10_000_000);
        let receipt = e.create(&create_request(&e, full_reserve(&e))).unwrap();
        let deal = DealRef {
            caller: a(),
            counterparty: b(),
            deal_key: receipt.deal_key,
            caller_index: 3,
            counterparty_index: 0,
        };
        assert_eq!(
            e.recall(&deal).unwrap_err(),
            DealboxError::RegistryMismatch {
                account: a(),
                index: 3
            }
        );
        assert_eq!(e.deal(&receipt.deal_key).unwrap().first.status, DealStatus::Proposed);
    }
}
