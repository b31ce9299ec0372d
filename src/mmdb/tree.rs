//! MMDB search tree traversal
//!
//! Each node holds two records (left for bit 0, right for bit 1). A record
//! below `node_count` is another node, equal to `node_count` means "not
//! found", and anything above points into the data section.

use super::format::MmdbHeader;
use super::types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR};
use std::cmp::Ordering;
use std::net::IpAddr;

/// Result of an IP lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupResult {
    /// Offset relative to the start of the data section
    pub data_offset: u32,
    /// Prefix length of the matching network, in the queried address family
    pub prefix_len: u8,
}

/// Search tree view over a complete MMDB file
pub struct SearchTree<'a> {
    data: &'a [u8],
    header: &'a MmdbHeader,
}

impl<'a> SearchTree<'a> {
    /// Wrap a file buffer and its parsed header
    pub fn new(data: &'a [u8], header: &'a MmdbHeader) -> Self {
        Self { data, header }
    }

    /// Look up an IP address
    ///
    /// IPv4 queries against an IPv6 tree walk the ::/96 subtree and report
    /// IPv4 prefix lengths.
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<LookupResult>, MmdbError> {
        let (bits, bit_count, v4_in_v6) = match (ip, self.header.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => ((u128::from(u32::from(v4))) << 96, 32u8, false),
            (IpAddr::V4(v4), IpVersion::V6) => (u128::from(u32::from(v4)), 128u8, true),
            (IpAddr::V6(v6), IpVersion::V6) => (u128::from(v6), 128u8, false),
            (IpAddr::V6(v6), IpVersion::V4) => {
                return Err(MmdbError::InvalidFormat(format!(
                    "cannot look up IPv6 address {} in an IPv4 database",
                    v6
                )))
            }
        };

        let mut node = 0u32;
        for depth in 0..bit_count {
            let bit = ((bits >> (127 - depth)) & 1) as u8;
            let record = self.read_record(node, bit)?;

            match record.cmp(&self.header.node_count) {
                Ordering::Less => node = record,
                Ordering::Equal => return Ok(None),
                Ordering::Greater => {
                    let matched = depth + 1;
                    let prefix_len = if v4_in_v6 {
                        matched.saturating_sub(96)
                    } else {
                        matched
                    };
                    return Ok(Some(LookupResult {
                        data_offset: self.data_offset(record)?,
                        prefix_len,
                    }));
                }
            }
        }

        Err(MmdbError::InvalidFormat(
            "search tree is deeper than the address".to_string(),
        ))
    }

    /// Read one record of a node (`side` 0 = left, 1 = right)
    fn read_record(&self, node: u32, side: u8) -> Result<u32, MmdbError> {
        if node >= self.header.node_count {
            return Err(MmdbError::InvalidFormat(format!(
                "node index {} exceeds node count {}",
                node, self.header.node_count
            )));
        }

        let node_bytes = self.header.record_size.node_bytes();
        let start = node as usize * node_bytes;
        let b = self
            .data
            .get(start..start + node_bytes)
            .filter(|_| start + node_bytes <= self.header.tree_size)
            .ok_or_else(|| {
                MmdbError::InvalidFormat(format!("node {} lies outside the search tree", node))
            })?;

        let be = |bytes: &[u8]| bytes.iter().fold(0u32, |acc, &x| (acc << 8) | u32::from(x));

        Ok(match (self.header.record_size, side) {
            (RecordSize::Bits24, 0) => be(&b[0..3]),
            (RecordSize::Bits24, _) => be(&b[3..6]),
            // Middle byte carries the high nibble of each record
            (RecordSize::Bits28, 0) => (u32::from(b[3] & 0xF0) << 20) | be(&b[0..3]),
            (RecordSize::Bits28, _) => (u32::from(b[3] & 0x0F) << 24) | be(&b[4..7]),
            (RecordSize::Bits32, 0) => be(&b[0..4]),
            (RecordSize::Bits32, _) => be(&b[4..8]),
        })
    }

    /// data_offset = record - node_count - 16
    fn data_offset(&self, record: u32) -> Result<u32, MmdbError> {
        record
            .checked_sub(self.header.node_count)
            .and_then(|v| v.checked_sub(DATA_SECTION_SEPARATOR as u32))
            .ok_or_else(|| {
                MmdbError::InvalidFormat(format!(
                    "record {} is not a valid data pointer (node_count = {})",
                    record, self.header.node_count
                ))
            })
    }
}
