//! # dealbox-store
//!
//! **Keyed storage plane**: everything the escrow persists, plus the
//! reserve each stored box locks.
//!
//! ## Components
//!
//! 1. **KeyRegistry**: per-account fixed-capacity slot arrays of deal keys
//! 2. **DealStore**: deal records by key
//! 3. **SideDataStore**: per-party auxiliary byte boxes, written in chunks
//! 4. **StorageCostAccountant** / **CostAccumulator**: box reserve costs
//! 5. **DealCounters**: total / active / completed deal counts
//!
//! ## Plan / apply
//!
//! ```text
//! KeyRegistry.plan_register()  → RegistryWrite  → KeyRegistry.apply()
//! SideDataStore.plan_write()   → SideDataWrite  → SideDataStore.apply_write()
//! ```
//!
//! Planning reads state through `&self` and performs every check; applying
//! a planned write cannot fail. The escrow service relies on this split to
//! make each operation all-or-nothing.

pub mod cost;
pub mod counters;
pub mod records;
pub mod registry;
pub mod side_data;

pub use cost::{CostAccumulator, StorageCostAccountant};
pub use counters::DealCounters;
pub use records::DealStore;
pub use registry::{AccountRegistry, KeyRegistry, RegistryWrite};
pub use side_data::{SideDataKey, SideDataStore, SideDataWrite};
