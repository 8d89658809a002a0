//! # dealbox-types
//!
//! Shared types, errors, and configuration for the **Dealbox** escrow protocol.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`Address`], [`AssetId`], [`DealKey`] (with symmetric derivation)
//! - **Deal model**: [`DealRecord`], [`PartySide`], [`DealTerms`], [`DealStatus`], [`Role`]
//! - **Fund movements**: [`Transfer`], [`Payout`], [`PayoutReason`]
//! - **Results**: [`Confirmation`], [`CreateReceipt`]
//! - **Configuration**: [`EscrowConfig`]
//! - **Errors**: [`DealboxError`] with `DB_ERR_` prefix codes
//! - **Constants**: persisted-layout widths and reserve costs

pub mod config;
pub mod constants;
pub mod deal;
pub mod error;
pub mod ids;
pub mod receipt;
pub mod transfer;

// Re-export all primary types at crate root for ergonomic imports:
//   use dealbox_types::{DealKey, DealRecord, Transfer, ...};

pub use config::*;
pub use deal::*;
pub use error::*;
pub use ids::*;
pub use receipt::*;
pub use transfer::*;

// Constants are accessed via `dealbox_types::constants::FOO`
// (not re-exported to avoid name collisions).
