//! System-wide constants for Dealbox.
//!
//! Byte widths here are part of the persisted layout. Changing any of them
//! breaks compatibility with records already written.

/// Flat reserve charged for every allocated box.
pub const BOX_FLAT_COST: u64 = 2500;

/// Reserve charged per byte of (box length + key length).
pub const BOX_BYTE_COST: u64 = 400;

/// Width of an account address in bytes.
pub const ADDRESS_LEN: usize = 32;

/// Tag byte prefixed to every deal key.
pub const DEAL_KEY_TAG: u8 = b'D';

/// Width of a deal key: tag byte + SHA-256 digest.
pub const DEAL_KEY_LEN: usize = 33;

/// Key width of a registry box (the owning account address).
pub const REGISTRY_KEY_LEN: usize = ADDRESS_LEN;

/// Default number of deal-key slots per account registry.
pub const DEFAULT_REGISTRY_SLOTS: usize = 31;

/// Key width of a side-data box: account address + deal key digest.
pub const SIDE_DATA_KEY_LEN: usize = 64;

/// Default upper bound on a side-data box's declared length.
pub const DEFAULT_MAX_SIDE_DATA_LEN: u64 = 32_768;

/// Maximum note length accepted at deal creation.
pub const MAX_NOTE_LEN: usize = 874;

/// Width of the fixed portion of an encoded deal record.
pub const RECORD_HEAD_LEN: usize = 148;

/// Offset of the note body: fixed head + 2-byte offset + 2-byte length prefix.
pub const RECORD_NOTE_OFFSET: usize = RECORD_HEAD_LEN + 4;
