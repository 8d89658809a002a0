//! Configuration for a Dealbox escrow instance.

use serde::{Deserialize, Serialize};

use crate::{Address, DealboxError, Result, constants};

/// Tunables of one escrow instance.
///
/// The defaults reproduce the persisted-format constants; only
/// `escrow_address` normally differs between deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Account that receives deposits, collateral and reserve payments.
    pub escrow_address: Address,
    /// Flat reserve per allocated box.
    pub box_flat_cost: u64,
    /// Reserve per byte of (box length + key length).
    pub box_byte_cost: u64,
    /// Deal-key slots per account registry.
    pub registry_slots: usize,
    /// Maximum deal note length in bytes.
    pub max_note_len: usize,
    /// Maximum declared side-data box length.
    pub max_side_data_len: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        let mut escrow = [0u8; constants::ADDRESS_LEN];
        escrow[constants::ADDRESS_LEN - 1] = 1;
        Self {
            escrow_address: Address(escrow),
            box_flat_cost: constants::BOX_FLAT_COST,
            box_byte_cost: constants::BOX_BYTE_COST,
            registry_slots: constants::DEFAULT_REGISTRY_SLOTS,
            max_note_len: constants::MAX_NOTE_LEN,
            max_side_data_len: constants::DEFAULT_MAX_SIDE_DATA_LEN,
        }
    }
}

impl EscrowConfig {
    /// Default configuration with a specific escrow account.
    #[must_use]
    pub fn with_escrow(escrow_address: Address) -> Self {
        Self {
            escrow_address,
            ..Self::default()
        }
    }

    /// Parse from JSON (missing fields take their defaults) and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the values are usable.
    ///
    /// # Errors
    /// Returns `Configuration` for a zero escrow address, zero registry
    /// slots, a note limit above the key-derivation limit, or a zero
    /// side-data limit.
    pub fn validate(&self) -> Result<()> {
        if self.escrow_address.is_zero() {
            return Err(DealboxError::Configuration(
                "escrow_address must not be zero".into(),
            ));
        }
        if self.registry_slots == 0 {
            return Err(DealboxError::Configuration(
                "registry_slots must be > 0".into(),
            ));
        }
        if self.max_note_len > constants::MAX_NOTE_LEN {
            return Err(DealboxError::Configuration(format!(
                "max_note_len {} exceeds protocol limit {}",
                self.max_note_len,
                constants::MAX_NOTE_LEN
            )));
        }
        if self.max_side_data_len == 0 {
            return Err(DealboxError::Configuration(
                "max_side_data_len must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Byte length of one account's registry box.
    #[must_use]
    pub fn registry_box_len(&self) -> usize {
        self.registry_slots * constants::DEAL_KEY_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EscrowConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.registry_slots, 31);
        assert_eq!(cfg.registry_box_len(), 1023);
        assert_eq!(cfg.box_flat_cost, 2500);
        assert_eq!(cfg.box_byte_cost, 400);
    }

    #[test]
    fn json_fills_missing_fields() {
        let cfg = EscrowConfig::from_json_str(r#"{"registry_slots": 8}"#).unwrap();
        assert_eq!(cfg.registry_slots, 8);
        assert_eq!(cfg.max_note_len, constants::MAX_NOTE_LEN);
    }

    #[test]
    fn zero_slots_rejected() {
        let err = EscrowConfig::from_json_str(r#"{"registry_slots": 0}"#).unwrap_err();
        assert!(matches!(err, DealboxError::Configuration(_)));
    }

    #[test]
    fn zero_escrow_rejected() {
        let cfg = EscrowConfig::with_escrow(Address::ZERO);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = EscrowConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, DealboxError::Serialization(_)));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = EscrowConfig::with_escrow(Address::repeat(9));
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EscrowConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
