//! Error types for the Dealbox escrow protocol.
//!
//! All errors use the `DB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by failure class:
//! - 1xx: Validation (malformed input, rejected before any state is read)
//! - 2xx: Authorization / state mismatch
//! - 3xx: Funding mismatch
//! - 4xx: Resource (storage reserve)
//! - 5xx: Consistency
//! - 9xx: General / internal errors
//!
//! Every error aborts the whole invocation. Nothing is retried internally.

use thiserror::Error;

use crate::{Address, DealKey, DealStatus};

/// Central error enum for all Dealbox operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DealboxError {
    // =================================================================
    // Validation (1xx)
    // =================================================================
    /// An argument was malformed (wrong length, equal parties, zero address...).
    #[error("DB_ERR_100: Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The deal note exceeds the configured maximum.
    #[error("DB_ERR_101: Note too long: {len} bytes, max {max}")]
    NoteTooLong { len: usize, max: usize },

    /// A declared side-data length exceeds the configured maximum.
    #[error("DB_ERR_102: Payload too large: {len} bytes, max {max}")]
    PayloadTooLarge { len: u64, max: u64 },

    /// A side-data chunk would be written past the end of its box.
    #[error("DB_ERR_103: Payload chunk out of bounds: offset {offset} + {len} > box length {box_len}")]
    PayloadOutOfBounds { offset: u64, len: u64, box_len: u64 },

    /// A registry index points past the last slot.
    #[error("DB_ERR_104: Registry slot index {index} out of range (slots: {slots})")]
    SlotIndexOutOfRange { index: u64, slots: usize },

    // =================================================================
    // Authorization / State (2xx)
    // =================================================================
    /// A party's status is not in the precondition set of the transition.
    #[error("DB_ERR_200: Invalid status for {operation}: mine {mine}, theirs {theirs}")]
    InvalidStatus {
        operation: &'static str,
        mine: DealStatus,
        theirs: DealStatus,
    },

    /// The caller or the named counterparty is not a recorded party of the deal.
    #[error("DB_ERR_201: {0} is not a party to this deal")]
    NotAParty(Address),

    /// The registry slot does not hold the expected deal key.
    #[error("DB_ERR_202: Registry of {account} does not hold the deal key at slot {index}")]
    RegistryMismatch { account: Address, index: u64 },

    /// The registry slot targeted by a registration is already in use.
    #[error("DB_ERR_203: Registry slot {index} of {account} is occupied")]
    SlotOccupied { account: Address, index: u64 },

    /// No record exists for the deal key.
    #[error("DB_ERR_204: Deal not found: {0}")]
    DealNotFound(DealKey),

    /// A proposed forward amount exceeds the deposit it would be taken from.
    #[error("DB_ERR_205: Forward amount {forward} exceeds deposit {deposit}")]
    ForwardExceedsDeposit { forward: u64, deposit: u64 },

    // =================================================================
    // Funding (3xx)
    // =================================================================
    /// A bundled transfer does not match the required sender/receiver/asset/amount.
    #[error("DB_ERR_300: Funding mismatch: {reason}")]
    FundingMismatch { reason: String },

    /// The sender of a bundled transfer does not hold the funds.
    #[error("DB_ERR_301: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    // =================================================================
    // Resource (4xx)
    // =================================================================
    /// The funding provided does not cover the reserve of newly created boxes.
    #[error("DB_ERR_400: Insufficient reserve: required {required}, provided {provided}")]
    InsufficientReserve { required: u64, provided: u64 },

    // =================================================================
    // Consistency (5xx)
    // =================================================================
    /// A record already exists for this deal key (no overwrite).
    #[error("DB_ERR_500: Deal already exists: {0}")]
    DealAlreadyExists(DealKey),

    /// Supply conservation invariant violated; critical safety alert.
    #[error("DB_ERR_501: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// A global counter would go below zero.
    #[error("DB_ERR_502: Counter underflow: {counter}")]
    CounterUnderflow { counter: &'static str },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("DB_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("DB_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad values, etc.).
    #[error("DB_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DealboxError>;

impl From<serde_json::Error> for DealboxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl DealboxError {
    /// Shorthand for [`DealboxError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`DealboxError::FundingMismatch`].
    pub fn funding(reason: impl Into<String>) -> Self {
        Self::FundingMismatch {
            reason: reason.into(),
        }
    }
}
