//! MMDB-specific type definitions

use std::fmt;

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the zero-filled separator between search tree and data section
pub const DATA_SECTION_SEPARATOR: usize = 16;

/// MMDB-specific error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmdbError {
    /// Invalid file format
    InvalidFormat(String),
    /// Metadata not found
    MetadataNotFound,
    /// Invalid metadata structure
    InvalidMetadata(String),
    /// Data decoding error
    DecodeError(String),
}

impl fmt::Display for MmdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmdbError::InvalidFormat(msg) => write!(f, "invalid MMDB format: {}", msg),
            MmdbError::MetadataNotFound => write!(f, "MMDB metadata marker not found"),
            MmdbError::InvalidMetadata(msg) => write!(f, "invalid metadata: {}", msg),
            MmdbError::DecodeError(msg) => write!(f, "data decode error: {}", msg),
        }
    }
}

impl std::error::Error for MmdbError {}

/// IP version of the search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpVersion {
    /// IPv4 only (32-bit deep tree)
    V4,
    /// IPv6, with IPv4 networks stored under ::/96
    #[default]
    V6,
}

impl IpVersion {
    /// Tree depth in bits
    pub fn bit_count(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }

    /// Value stored in the `ip_version` metadata field
    pub fn metadata_value(self) -> u16 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSize {
    /// 24-bit records (6 bytes per node)
    #[default]
    Bits24 = 24,
    /// 28-bit records (7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Largest value a single record can hold
    pub fn max_record_value(self) -> u32 {
        match self {
            RecordSize::Bits24 => (1 << 24) - 1,
            RecordSize::Bits28 => (1 << 28) - 1,
            RecordSize::Bits32 => u32::MAX,
        }
    }

    /// Value stored in the `record_size` metadata field
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Create from bit size
    pub fn from_bits(bits: u16) -> Result<Self, MmdbError> {
        match bits {
            24 => Ok(RecordSize::Bits24),
            28 => Ok(RecordSize::Bits28),
            32 => Ok(RecordSize::Bits32),
            _ => Err(MmdbError::InvalidFormat(format!(
                "invalid record size: {} bits",
                bits
            ))),
        }
    }
}
