//! # dealbox-escrow
//!
//! **Deal lifecycle plane**: the two-party escrow state machine, payout
//! computation, the account book, and the atomic commit path.
//!
//! ## Architecture
//!
//! 1. **lifecycle**: role-parameterised transitions (match, adjust, agree,
//!    recall, reject, attach) over a borrowed [`DealRecord`](dealbox_types::DealRecord)
//! 2. **disbursement**: payouts for a fully agreed deal
//! 3. **Vault**: per-(account, asset) balances, escrow account included
//! 4. **SupplyConservation**: Σ balances == Σ funded, checked after every commit
//! 5. **Changeset** / **CommitLog**: the unit of atomic change and its audit trail
//! 6. **DealEscrow**: the service tying it together; **SharedEscrow** for threads
//!
//! ## Call Flow
//!
//! ```text
//! request → DealEscrow.plan_*()  (&self: registry confirm, status, funding, reserve)
//!         → Changeset
//!         → DealEscrow.commit()  (&mut self: stores, vault, counters, CommitLog)
//! ```
//!
//! A call that fails during planning changes nothing.

pub mod changeset;
pub mod disbursement;
pub mod escrow;
pub mod lifecycle;
pub mod request;
pub mod shared;
pub mod supply_conservation;
pub mod vault;

pub use changeset::{Changeset, CommitEntry, CommitId, CommitLog, Operation, RecordChange};
pub use disbursement::disburse;
pub use escrow::DealEscrow;
pub use lifecycle::{AgreeOutcome, Parties};
pub use request::{AttachRequest, CreateRequest, DealRef, MatchRequest};
pub use shared::SharedEscrow;
pub use supply_conservation::SupplyConservation;
pub use vault::Vault;
