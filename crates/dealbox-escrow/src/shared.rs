//! Thread-safe handle to one escrow.
//!
//! All calls go through a single mutex, so calls on the same deal are
//! totally ordered and the loser of a race sees the winner's state
//! advance and fails its own status check.

use std::sync::{Arc, Mutex, MutexGuard};

use dealbox_store::DealCounters;
use dealbox_types::{
    Address, AssetId, Confirmation, CreateReceipt, DealKey, DealRecord, DealboxError, EscrowConfig,
    Result,
};

use crate::escrow::DealEscrow;
use crate::request::{AttachRequest, CreateRequest, DealRef, MatchRequest};

/// Cloneable, `Send + Sync` wrapper around [`DealEscrow`].
#[derive(Debug, Clone)]
pub struct SharedEscrow {
    inner: Arc<Mutex<DealEscrow>>,
}

impl SharedEscrow {
    /// # Errors
    /// Returns `Configuration` if `config` does not validate.
    pub fn new(config: EscrowConfig) -> Result<Self> {
        Ok(Self::from_escrow(DealEscrow::new(config)?))
    }

    #[must_use]
    pub fn from_escrow(escrow: DealEscrow) -> Self {
        Self {
            inner: Arc::new(Mutex::new(escrow)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DealEscrow>> {
        self.inner
            .lock()
            .map_err(|_| DealboxError::Internal("escrow lock poisoned".into()))
    }

    /// Run `f` with exclusive access to the escrow.
    pub fn with<T>(&self, f: impl FnOnce(&mut DealEscrow) -> T) -> Result<T> {
        let mut guard = self.lock()?;
        Ok(f(&mut *guard))
    }

    pub fn create(&self, request: &CreateRequest) -> Result<CreateReceipt> {
        self.lock()?.create(request)
    }

    pub fn attach(&self, request: &AttachRequest) -> Result<u64> {
        self.lock()?.attach(request)
    }

    pub fn match_deal(&self, request: &MatchRequest) -> Result<[u8; 2]> {
        self.lock()?.match_deal(request)
    }

    pub fn recall(&self, deal: &DealRef) -> Result<Confirmation> {
        self.lock()?.recall(deal)
    }

    pub fn reject(&self, deal: &DealRef) -> Result<Confirmation> {
        self.lock()?.reject(deal)
    }

    pub fn adjust(
        &self,
        deal: &DealRef,
        first_forward: u64,
        second_forward: u64,
    ) -> Result<Confirmation> {
        self.lock()?.adjust(deal, first_forward, second_forward)
    }

    pub fn agree(&self, deal: &DealRef) -> Result<Confirmation> {
        self.lock()?.agree(deal)
    }

    pub fn fund(&self, account: Address, asset: AssetId, amount: u64) -> Result<()> {
        self.lock()?.fund(account, asset, amount);
        Ok(())
    }

    /// Snapshot of the record under `key`.
    pub fn deal(&self, key: &DealKey) -> Result<Option<DealRecord>> {
        Ok(self.lock()?.deal(key).cloned())
    }

    pub fn counters(&self) -> Result<DealCounters> {
        Ok(self.lock()?.counters())
    }

    pub fn balance(&self, account: &Address, asset: AssetId) -> Result<u64> {
        Ok(self.lock()?.balance(account, asset))
    }
}
