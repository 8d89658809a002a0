//! # Deal record: the persisted state of one bilateral deal
//!
//! ## State Machine (per party)
//!
//! ```text
//!   ┌────────┐ create  ┌──────────┐ match  ┌────────┐ agree/adjust ┌──────────────────┐
//!   │ ABSENT ├────────▶│ PROPOSED ├───────▶│ LOCKED │◀────────────▶│ FORWARD_PROPOSED │
//!   └────────┘         └──────────┘        └────────┘              └──────────────────┘
//! ```
//!
//! The creator starts at PROPOSED and the counterparty at ABSENT. `match`
//! moves both to LOCKED. From there `adjust` and `agree` shuffle the two
//! parties between LOCKED and FORWARD_PROPOSED until both sit at
//! FORWARD_PROPOSED, which triggers disbursement and deletes the record.
//!
//! ## Persisted layout
//!
//! ```text
//! off  len  field
//!   0    1  first status
//!   1    1  second status
//!   2   32  first address
//!  34    8  first deposit amount        (u64, big-endian)
//!  42    8  first deposit asset
//!  50    8  first collateral amount
//!  58    8  first collateral asset
//!  66   32  second address
//!  98    8  second deposit amount
//! 106    8  second deposit asset
//! 114    8  second collateral amount
//! 122    8  second collateral asset
//! 130    8  first forward amount
//! 138    8  second forward amount
//! 146    1  first data flag
//! 147    1  second data flag
//! 148    2  note offset (always 150)
//! 150    2  note length
//! 152    n  note bytes
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{ADDRESS_LEN, RECORD_HEAD_LEN, RECORD_NOTE_OFFSET};
use crate::{Address, AssetId, DealboxError, Result};

/// Lifecycle status of one party within a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStatus {
    /// Not yet acted (counterparty before `match`).
    Absent,
    /// Deposit and collateral posted, awaiting the counterparty.
    Proposed,
    /// Both sides deposited, disbursement under negotiation.
    Locked,
    /// This side has confirmed the currently stored split.
    ForwardProposed,
}

impl DealStatus {
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Absent => 0,
            Self::Proposed => 1,
            Self::Locked => 2,
            Self::ForwardProposed => 3,
        }
    }

    /// # Errors
    /// Returns `Serialization` for bytes outside `0..=3`.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::Absent),
            1 => Ok(Self::Proposed),
            2 => Ok(Self::Locked),
            3 => Ok(Self::ForwardProposed),
            other => Err(DealboxError::Serialization(format!(
                "invalid deal status byte {other:#04x}"
            ))),
        }
    }

    /// Whether the party has money in the deal (statuses 1, 2, 3).
    #[must_use]
    pub fn is_participating(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "ABSENT"),
            Self::Proposed => write!(f, "PROPOSED"),
            Self::Locked => write!(f, "LOCKED"),
            Self::ForwardProposed => write!(f, "FORWARD_PROPOSED"),
        }
    }
}

/// Canonical role of a party, fixed at creation by address ordering:
/// the byte-wise greater address is `First`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    First,
    Second,
}

impl Role {
    /// Role of `me` in a deal with `them`.
    #[must_use]
    pub fn of(me: &Address, them: &Address) -> Self {
        if me > them { Self::First } else { Self::Second }
    }

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

/// One party's deposit and collateral terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DealTerms {
    pub deposit_amount: u64,
    pub deposit_asset: AssetId,
    pub collateral_amount: u64,
    pub collateral_asset: AssetId,
}

impl DealTerms {
    #[must_use]
    pub fn new(
        deposit_amount: u64,
        deposit_asset: AssetId,
        collateral_amount: u64,
        collateral_asset: AssetId,
    ) -> Self {
        Self {
            deposit_amount,
            deposit_asset,
            collateral_amount,
            collateral_asset,
        }
    }

    /// Deposit and collateral both in the native coin.
    #[must_use]
    pub fn native(deposit_amount: u64, collateral_amount: u64) -> Self {
        Self::new(
            deposit_amount,
            AssetId::NATIVE,
            collateral_amount,
            AssetId::NATIVE,
        )
    }

    /// Native-coin value held under these terms (deposit and/or collateral).
    #[must_use]
    pub fn native_value(&self) -> u64 {
        let dep = if self.deposit_asset.is_native() {
            self.deposit_amount
        } else {
            0
        };
        let col = if self.collateral_asset.is_native() {
            self.collateral_amount
        } else {
            0
        };
        dep.saturating_add(col)
    }
}

/// Everything recorded about one side of a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySide {
    pub status: DealStatus,
    pub address: Address,
    pub terms: DealTerms,
    /// Portion of this side's deposit forwarded to the counterparty on disbursement.
    pub forward_amount: u64,
    /// Whether this side has attached side data.
    pub has_data: bool,
}

/// The fixed-layout record stored under a [`DealKey`](crate::DealKey).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRecord {
    pub first: PartySide,
    pub second: PartySide,
    pub note: String,
}

impl DealRecord {
    /// Build the record for a freshly proposed deal.
    ///
    /// The proposer is PROPOSED, the counterparty ABSENT, and both forward
    /// amounts default to the full deposit (forward entirely to the other side).
    #[must_use]
    pub fn propose(
        proposer: Address,
        proposer_terms: DealTerms,
        counterparty: Address,
        counterparty_terms: DealTerms,
        note: impl Into<String>,
    ) -> Self {
        let side = |address: Address, terms: DealTerms, status: DealStatus| PartySide {
            status,
            address,
            terms,
            forward_amount: terms.deposit_amount,
            has_data: false,
        };
        let mine = side(proposer, proposer_terms, DealStatus::Proposed);
        let theirs = side(counterparty, counterparty_terms, DealStatus::Absent);
        let (first, second) = match Role::of(&proposer, &counterparty) {
            Role::First => (mine, theirs),
            Role::Second => (theirs, mine),
        };
        Self {
            first,
            second,
            note: note.into(),
        }
    }

    #[must_use]
    pub fn side(&self, role: Role) -> &PartySide {
        match role {
            Role::First => &self.first,
            Role::Second => &self.second,
        }
    }

    pub fn side_mut(&mut self, role: Role) -> &mut PartySide {
        match role {
            Role::First => &mut self.first,
            Role::Second => &mut self.second,
        }
    }

    /// Role held by `address`, if it is a party at all.
    #[must_use]
    pub fn role_of(&self, address: &Address) -> Option<Role> {
        if self.first.address == *address {
            Some(Role::First)
        } else if self.second.address == *address {
            Some(Role::Second)
        } else {
            None
        }
    }

    /// The status pair as persisted: `[first, second]`.
    #[must_use]
    pub fn status_bytes(&self) -> [u8; 2] {
        [self.first.status.as_byte(), self.second.status.as_byte()]
    }

    /// Length of the encoded record.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        RECORD_NOTE_OFFSET + self.note.len()
    }

    /// Serialize into the persisted byte layout.
    ///
    /// # Errors
    /// Returns `Serialization` if the note does not fit a 16-bit length prefix.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let note_len = u16::try_from(self.note.len())
            .map_err(|_| DealboxError::Serialization("note longer than 65535 bytes".into()))?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.first.status.as_byte());
        out.push(self.second.status.as_byte());
        for side in [&self.first, &self.second] {
            out.extend_from_slice(side.address.as_bytes());
            out.extend_from_slice(&side.terms.deposit_amount.to_be_bytes());
            out.extend_from_slice(&side.terms.deposit_asset.0.to_be_bytes());
            out.extend_from_slice(&side.terms.collateral_amount.to_be_bytes());
            out.extend_from_slice(&side.terms.collateral_asset.0.to_be_bytes());
        }
        out.extend_from_slice(&self.first.forward_amount.to_be_bytes());
        out.extend_from_slice(&self.second.forward_amount.to_be_bytes());
        out.push(u8::from(self.first.has_data));
        out.push(u8::from(self.second.has_data));
        debug_assert_eq!(out.len(), RECORD_HEAD_LEN);

        #[allow(clippy::cast_possible_truncation)]
        let offset = (RECORD_HEAD_LEN + 2) as u16;
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&note_len.to_be_bytes());
        out.extend_from_slice(self.note.as_bytes());
        Ok(out)
    }

    /// Parse the persisted byte layout.
    ///
    /// # Errors
    /// Returns `Serialization` on truncated input, a bad note offset or
    /// length, invalid status or flag bytes, or a non-UTF-8 note.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_NOTE_OFFSET {
            return Err(DealboxError::Serialization(format!(
                "deal record too short: {} bytes",
                bytes.len()
            )));
        }
        let mut cursor = Cursor { bytes, pos: 2 };
        let first_status = DealStatus::from_byte(bytes[0])?;
        let second_status = DealStatus::from_byte(bytes[1])?;

        let first_address = cursor.address();
        let first_terms = cursor.terms();
        let second_address = cursor.address();
        let second_terms = cursor.terms();
        let first_forward = cursor.u64();
        let second_forward = cursor.u64();
        let first_data = flag(bytes[146])?;
        let second_data = flag(bytes[147])?;

        let offset = usize::from(u16::from_be_bytes([bytes[148], bytes[149]]));
        if offset != RECORD_HEAD_LEN + 2 {
            return Err(DealboxError::Serialization(format!(
                "unexpected note offset {offset}"
            )));
        }
        let note_len = usize::from(u16::from_be_bytes([bytes[150], bytes[151]]));
        let body = &bytes[RECORD_NOTE_OFFSET..];
        if body.len() != note_len {
            return Err(DealboxError::Serialization(format!(
                "note length {note_len} does not match {} trailing bytes",
                body.len()
            )));
        }
        let note = std::str::from_utf8(body)
            .map_err(|e| DealboxError::Serialization(format!("note is not UTF-8: {e}")))?
            .to_string();

        Ok(Self {
            first: PartySide {
                status: first_status,
                address: first_address,
                terms: first_terms,
                forward_amount: first_forward,
                has_data: first_data,
            },
            second: PartySide {
                status: second_status,
                address: second_address,
                terms: second_terms,
                forward_amount: second_forward,
                has_data: second_data,
            },
            note,
        })
    }
}

fn flag(byte: u8) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DealboxError::Serialization(format!(
            "invalid data flag byte {other:#04x}"
        ))),
    }
}

/// Reader over the fixed head. Callers check the length up front.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u64(&mut self) -> u64 {
        u64::from_be_bytes(self.take::<8>())
    }

    fn address(&mut self) -> Address {
        Address(self.take::<ADDRESS_LEN>())
    }

    fn terms(&mut self) -> DealTerms {
        DealTerms {
            deposit_amount: self.u64(),
            deposit_asset: AssetId(self.u64()),
            collateral_amount: self.u64(),
            collateral_asset: AssetId(self.u64()),
        }
    }
}

/// Dummy terms for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl DealTerms {
    /// 100 units deposit with 10 units collateral, both in `asset`.
    pub fn dummy(asset: AssetId) -> Self {
        Self::new(100, asset, 10, asset)
    }
}
