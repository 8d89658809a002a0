//! Identifiers used throughout Dealbox.
//!
//! Accounts are raw 32-byte addresses, assets are numeric ids with `0`
//! reserved for the native coin, and deals are addressed by a 33-byte
//! [`DealKey`] derived from the two parties and the note.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::constants::{ADDRESS_LEN, DEAL_KEY_LEN, DEAL_KEY_TAG, MAX_NOTE_LEN};
use crate::{DealboxError, Result};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte account address.
///
/// Ordering is byte-wise lexicographic; it decides which party of a deal
/// takes the "first" role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address. Never a valid party.
    pub const ZERO: Self = Self([0u8; ADDRESS_LEN]);

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// Asset identifier. [`AssetId::NATIVE`] denotes the chain's native coin,
/// any other value a specific fungible asset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct AssetId(pub u64);

impl AssetId {
    /// Sentinel for the native coin.
    pub const NATIVE: Self = Self(0);

    #[must_use]
    pub fn is_native(self) -> bool {
        self == Self::NATIVE
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "asset:{}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// DealKey
// ---------------------------------------------------------------------------

/// Canonical, order-independent identifier of a deal.
///
/// Layout: `b'D' || SHA-256(greater || lesser || note)`, where `greater` is
/// the byte-wise larger of the two party addresses. Swapping the parties
/// yields the same key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct DealKey([u8; DEAL_KEY_LEN]);

impl DealKey {
    /// Derive the key for a deal between `a` and `b` with the given note.
    ///
    /// # Errors
    /// - `InvalidArgument` if either address is zero or both are equal
    /// - `NoteTooLong` if the note exceeds [`MAX_NOTE_LEN`]
    pub fn derive(a: &Address, b: &Address, note: &str) -> Result<Self> {
        if a.is_zero() || b.is_zero() {
            return Err(DealboxError::invalid("party address is zero"));
        }
        if a == b {
            return Err(DealboxError::invalid("parties must be different accounts"));
        }
        if note.len() > MAX_NOTE_LEN {
            return Err(DealboxError::NoteTooLong {
                len: note.len(),
                max: MAX_NOTE_LEN,
            });
        }

        let (greater, lesser) = if a > b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update(greater.as_bytes());
        hasher.update(lesser.as_bytes());
        hasher.update(note.as_bytes());
        let digest = hasher.finalize();

        let mut key = [0u8; DEAL_KEY_LEN];
        key[0] = DEAL_KEY_TAG;
        key[1..].copy_from_slice(&digest);
        Ok(Self(key))
    }

    /// Wrap raw key bytes without validation.
    #[must_use]
    pub fn from_bytes(bytes: [u8; DEAL_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a key from an untyped byte slice.
    ///
    /// # Errors
    /// Returns `InvalidArgument` unless the slice is 33 bytes starting with the tag.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; DEAL_KEY_LEN] = bytes.try_into().map_err(|_| {
            DealboxError::invalid(format!(
                "deal key must be {DEAL_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        if arr[0] != DEAL_KEY_TAG {
            return Err(DealboxError::invalid("deal key tag byte mismatch"));
        }
        Ok(Self(arr))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DEAL_KEY_LEN] {
        &self.0
    }

    /// The 32-byte content hash (key without its tag byte).
    #[must_use]
    pub fn digest(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[1..]);
        out
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for DealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DealKey({})", self.to_hex())
    }
}

impl fmt::Display for DealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deal:{}", hex::encode(&self.0[1..9]))
    }
}

impl FromStr for DealKey {
    type Err = DealboxError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s).map_err(|e| DealboxError::invalid(format!("deal key hex: {e}")))?;
        Self::from_slice(&bytes)
    }
}

// serde has no impls for 33-byte arrays; keys travel as hex strings.
impl Serialize for DealKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DealKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Random addresses for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Address {
    /// A random non-zero address.
    pub fn dummy() -> Self {
        loop {
            let addr = Self(rand::random::<[u8; ADDRESS_LEN]>());
            if !addr.is_zero() {
                return addr;
            }
        }
    }

    /// A deterministic address filled with `byte`.
    pub fn repeat(byte: u8) -> Self {
        Self([byte; ADDRESS_LEN])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_symmetric() {
        let a = Address::repeat(0x11);
        let b = Address::repeat(0x22);
        let ab = DealKey::derive(&a, &b, "swap1").unwrap();
        let ba = DealKey::derive(&b, &a, "swap1").unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn key_symmetry_random_pairs() {
        for _ in 0..64 {
            let a = Address::dummy();
            let b = Address::dummy();
            let note = format!("note-{}", rand::random::<u32>());
            assert_eq!(
                DealKey::derive(&a, &b, &note).unwrap(),
                DealKey::derive(&b, &a, &note).unwrap()
            );
        }
    }

    #[test]
    fn key_layout_is_tag_plus_sha256_of_greater_lesser_note() {
        let a = Address::repeat(0x01);
        let b = Address::repeat(0xFE);
        let key = DealKey::derive(&a, &b, "memo").unwrap();

        let mut hasher = Sha256::new();
        hasher.update(b.as_bytes());
        hasher.update(a.as_bytes());
        hasher.update(b"memo");
        let mut expected = [0u8; 32];
        expected.copy_from_slice(&hasher.finalize());

        assert_eq!(key.as_bytes()[0], b'D');
        assert_eq!(key.digest(), expected);
    }

    #[test]
    fn different_notes_different_keys() {
        let a = Address::repeat(1);
        let b = Address::repeat(2);
        let k1 = DealKey::derive(&a, &b, "one").unwrap();
        let k2 = DealKey::derive(&a, &b, "two").unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn different_pairs_different_keys() {
        let a = Address::repeat(1);
        let b = Address::repeat(2);
        let c = Address::repeat(3);
        assert_ne!(
            DealKey::derive(&a, &b, "x").unwrap(),
            DealKey::derive(&a, &c, "x").unwrap()
        );
    }

    #[test]
    fn equal_parties_rejected() {
        let a = Address::repeat(7);
        let err = DealKey::derive(&a, &a, "self").unwrap_err();
        assert!(matches!(err, DealboxError::InvalidArgument { .. }));
    }

    #[test]
    fn zero_address_rejected() {
        let err = DealKey::derive(&Address::ZERO, &Address::repeat(1), "x").unwrap_err();
        assert!(matches!(err, DealboxError::InvalidArgument { .. }));
    }

    #[test]
    fn oversized_note_rejected() {
        let note = "n".repeat(MAX_NOTE_LEN + 1);
        let err = DealKey::derive(&Address::repeat(1), &Address::repeat(2), &note).unwrap_err();
        assert!(matches!(err, DealboxError::NoteTooLong { .. }));
    }

    #[test]
    fn key_from_slice_checks_tag_and_len() {
        assert!(DealKey::from_slice(&[b'D'; 32]).is_err());
        assert!(DealKey::from_slice(&[b'X'; 33]).is_err());
        assert!(DealKey::from_slice(&[b'D'; 33]).is_ok());
    }

    #[test]
    fn key_hex_roundtrip() {
        let key = DealKey::derive(&Address::repeat(1), &Address::repeat(2), "hex").unwrap();
        let parsed: DealKey = key.to_hex().parse().unwrap();
        assert_eq!(key, parsed);

        let json = serde_json::to_string(&key).unwrap();
        let back: DealKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, back);
    }

    #[test]
    fn address_ordering_is_bytewise() {
        let mut lo = [0u8; 32];
        lo[0] = 1;
        let mut hi = [0u8; 32];
        hi[0] = 2;
        assert!(Address(hi) > Address(lo));
    }

    #[test]
    fn asset_display() {
        assert_eq!(AssetId::NATIVE.to_string(), "native");
        assert_eq!(AssetId(31_566_704).to_string(), "asset:31566704");
    }
}
