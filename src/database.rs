//! Read-only access to a written MMDB file
//!
//! Used to verify conversion output: open a database (memory-mapped or from
//! a buffer), inspect its metadata, and look up addresses.
//!
//! ```no_run
//! use iplist2mmdb::Database;
//!
//! let db = Database::open("Country.mmdb")?;
//! if let Some(hit) = db.lookup("203.0.113.77")? {
//!     println!("/{} -> {:?}", hit.prefix_len, hit.data);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::data_section::{DataDecoder, DataValue};
use crate::mmdb::{read_metadata, MmdbError, MmdbHeader, SearchTree};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

/// A successful lookup
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Record stored for the matching network
    pub data: DataValue,
    /// Prefix length of the matching tree path
    pub prefix_len: u8,
}

enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// An opened MMDB database
pub struct Database {
    data: DatabaseStorage,
    header: MmdbHeader,
    metadata: DataValue,
}

impl Database {
    /// Memory-map the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DatabaseError::Io(format!("failed to open {}: {}", path.display(), e))
        })?;

        // SAFETY: the mapping is read-only and the file is not expected to
        // change while the database is open.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
            DatabaseError::Io(format!("failed to mmap {}: {}", path.display(), e))
        })?;

        Self::from_storage(DatabaseStorage::Mmap(mmap))
    }

    /// Use an in-memory database image
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, DatabaseError> {
        Self::from_storage(DatabaseStorage::Owned(data))
    }

    fn from_storage(storage: DatabaseStorage) -> Result<Self, DatabaseError> {
        let bytes = storage.as_slice();
        let header = MmdbHeader::from_bytes(bytes).map_err(DatabaseError::Format)?;
        let metadata = read_metadata(bytes).map_err(DatabaseError::Format)?;

        Ok(Self {
            data: storage,
            header,
            metadata,
        })
    }

    /// Look up an address given as text
    pub fn lookup(&self, query: &str) -> Result<Option<QueryResult>, DatabaseError> {
        let addr = query
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| DatabaseError::InvalidQuery(query.to_string()))?;
        self.lookup_ip(addr)
    }

    /// Look up an address
    ///
    /// Returns `Ok(None)` when no network covers `addr`.
    pub fn lookup_ip(&self, addr: IpAddr) -> Result<Option<QueryResult>, DatabaseError> {
        let bytes = self.data.as_slice();
        let tree = SearchTree::new(bytes, &self.header);

        let Some(hit) = tree.lookup(addr).map_err(DatabaseError::Format)? else {
            return Ok(None);
        };

        let data_section = &bytes[self.header.data_section_start()..];
        let data = DataDecoder::new(data_section)
            .decode(hit.data_offset)
            .map_err(|e| DatabaseError::Format(MmdbError::DecodeError(e.to_string())))?;

        Ok(Some(QueryResult {
            data,
            prefix_len: hit.prefix_len,
        }))
    }

    /// Full metadata map
    pub fn metadata(&self) -> &DataValue {
        &self.metadata
    }

    /// `database_type` metadata value
    pub fn database_type(&self) -> Option<String> {
        self.metadata
            .get("database_type")
            .and_then(DataValue::as_str)
            .map(String::from)
    }

    /// Search tree node count
    pub fn node_count(&self) -> u32 {
        self.header.node_count
    }

    /// Size of the database image in bytes
    pub fn len(&self) -> usize {
        self.data.as_slice().len()
    }

    /// Whether the image is empty (never true for an opened database)
    pub fn is_empty(&self) -> bool {
        self.data.as_slice().is_empty()
    }
}

/// Database error type
#[derive(Debug)]
pub enum DatabaseError {
    /// I/O error
    Io(String),
    /// Malformed database
    Format(MmdbError),
    /// Query text is not an IP address
    InvalidQuery(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::Io(msg) => write!(f, "I/O error: {}", msg),
            DatabaseError::Format(err) => write!(f, "format error: {}", err),
            DatabaseError::InvalidQuery(q) => write!(f, "not an IP address: {:?}", q),
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatabaseError::Format(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::writer::{MmdbWriter, WriterOptions};

    fn build(entries: &[(&str, DataValue)]) -> Database {
        let mut writer = MmdbWriter::new(WriterOptions::default()).unwrap();
        for (cidr, value) in entries {
            writer.insert(&cidr.parse::<Network>().unwrap(), value).unwrap();
        }
        Database::from_bytes(writer.to_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_lookup_ipv4_and_ipv6() {
        let db = build(&[
            ("192.0.2.0/24", DataValue::String("v4".to_string())),
            ("2001:db8::/32", DataValue::String("v6".to_string())),
        ]);

        let v4 = db.lookup("192.0.2.200").unwrap().unwrap();
        assert_eq!(v4.data, DataValue::String("v4".to_string()));
        assert_eq!(v4.prefix_len, 24);

        let v6 = db.lookup("2001:db8:1::1").unwrap().unwrap();
        assert_eq!(v6.data, DataValue::String("v6".to_string()));
        assert_eq!(v6.prefix_len, 32);
    }

    #[test]
    fn test_lookup_not_found() {
        let db = build(&[("192.0.2.0/24", DataValue::Bool(true))]);
        assert_eq!(db.lookup("192.0.3.1").unwrap(), None);
        assert_eq!(db.lookup("2001:db8::1").unwrap(), None);
    }

    #[test]
    fn test_lookup_rejects_non_ip() {
        let db = build(&[]);
        assert!(matches!(
            db.lookup("example.com"),
            Err(DatabaseError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_metadata_accessors() {
        let db = build(&[("10.0.0.0/8", DataValue::Uint32(1))]);
        assert_eq!(db.database_type().as_deref(), Some("GeoIP2-Country"));
        assert_eq!(
            db.metadata().get("node_count").and_then(DataValue::as_u64),
            Some(u64::from(db.node_count()))
        );
        assert!(!db.is_empty());
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = Database::from_bytes(b"definitely not an mmdb file".to_vec());
        assert!(matches!(
            result,
            Err(DatabaseError::Format(MmdbError::MetadataNotFound))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let result = Database::open("/nonexistent/Country.mmdb");
        assert!(matches!(result, Err(DatabaseError::Io(_))));
    }
}
