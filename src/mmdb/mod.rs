//! MaxMind DB (MMDB) reader internals
//!
//! - **types**: constants, record sizes and error type
//! - **format**: metadata location and header extraction
//! - **tree**: search tree traversal for IP lookups
//!
//! Data decoding reuses `crate::data_section::DataDecoder`.

pub mod format;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, read_metadata, MmdbHeader};
pub use tree::{LookupResult, SearchTree};
pub use types::{IpVersion, MmdbError, RecordSize, DATA_SECTION_SEPARATOR, METADATA_MARKER};
