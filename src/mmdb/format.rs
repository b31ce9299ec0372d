//! MMDB metadata parsing
//!
//! The metadata map sits after the last `\xAB\xCD\xEFMaxMind.com` marker in
//! the final 128KB of the file. Only the fields needed to walk the search
//! tree are pulled out eagerly; the full map is decoded on demand.

use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR, METADATA_MARKER};
use crate::data_section::{DataDecoder, DataValue};

/// Search tree geometry extracted from the metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
}

impl MmdbHeader {
    /// Parse the metadata of a complete MMDB file
    pub fn from_bytes(data: &[u8]) -> Result<Self, MmdbError> {
        let metadata = read_metadata(data)?;

        let node_count = required_uint(&metadata, "node_count")?;
        let record_bits = required_uint(&metadata, "record_size")?;
        let ip_version = match required_uint(&metadata, "ip_version")? {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            other => {
                return Err(MmdbError::InvalidMetadata(format!(
                    "invalid IP version: {}",
                    other
                )))
            }
        };

        let node_count = u32::try_from(node_count)
            .map_err(|_| MmdbError::InvalidMetadata("node_count exceeds u32".to_string()))?;
        let record_size = RecordSize::from_bits(record_bits as u16)?;
        let tree_size = node_count as usize * record_size.node_bytes();

        if tree_size + DATA_SECTION_SEPARATOR > data.len() {
            return Err(MmdbError::InvalidFormat(format!(
                "search tree of {} bytes does not fit in {} byte file",
                tree_size,
                data.len()
            )));
        }

        Ok(MmdbHeader {
            node_count,
            record_size,
            ip_version,
            tree_size,
        })
    }

    /// Start of the data section
    pub fn data_section_start(&self) -> usize {
        self.tree_size + DATA_SECTION_SEPARATOR
    }
}

/// Decode the full metadata map of an MMDB file
pub fn read_metadata(data: &[u8]) -> Result<DataValue, MmdbError> {
    let marker = find_metadata_marker(data)?;
    let metadata_bytes = &data[marker + METADATA_MARKER.len()..];

    let value = DataDecoder::new(metadata_bytes)
        .decode(0)
        .map_err(|e| MmdbError::InvalidMetadata(format!("failed to decode metadata: {}", e)))?;

    match value {
        DataValue::Map(_) => Ok(value),
        _ => Err(MmdbError::InvalidMetadata(
            "metadata is not a map".to_string(),
        )),
    }
}

/// Find the last metadata marker within the final 128KB
pub fn find_metadata_marker(data: &[u8]) -> Result<usize, MmdbError> {
    const SEARCH_SIZE: usize = 128 * 1024;

    if data.len() < METADATA_MARKER.len() {
        return Err(MmdbError::MetadataNotFound);
    }

    let search_start = data.len().saturating_sub(SEARCH_SIZE);
    data[search_start..]
        .windows(METADATA_MARKER.len())
        .rposition(|window| window == METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or(MmdbError::MetadataNotFound)
}

fn required_uint(metadata: &DataValue, key: &str) -> Result<u64, MmdbError> {
    match metadata.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            MmdbError::InvalidMetadata(format!("field '{}' is not an unsigned integer", key))
        }),
        None => Err(MmdbError::InvalidMetadata(format!(
            "required field '{}' not found",
            key
        ))),
    }
}
