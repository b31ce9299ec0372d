//! iplist2mmdb - build MaxMind DB country databases from sectioned IP lists
//!
//! An input list is a text file of CIDR networks grouped under `[TAG]`
//! section headers. Every network is stored in an MMDB search tree pointing
//! at the country record of its section.
//!
//! # Quick Start
//!
//! ```rust
//! use iplist2mmdb::{Converter, Database, MmdbWriter, WriterOptions};
//! use std::io::Cursor;
//!
//! let source = "[CN]\n203.0.113.0/24\n[CF]\n41.78.124.0/22\n";
//!
//! let converter = Converter::default();
//! let options = WriterOptions::default()
//!     .with_languages(converter.catalog().languages());
//! let mut writer = MmdbWriter::new(options)?;
//! let stats = converter.convert(Cursor::new(source), &mut writer)?;
//! assert_eq!(stats.ranges, 2);
//!
//! let db = Database::from_bytes(writer.to_bytes()?)?;
//! let hit = db.lookup("203.0.113.77")?.expect("network was inserted");
//! let iso = hit.data.get("country").and_then(|c| c.get("iso_code"));
//! assert_eq!(iso.and_then(|v| v.as_str()), Some("CN"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - [`catalog`]: section tag to country record mapping
//! - [`network`]: strict CIDR parsing
//! - [`converter`]: the section-aware line parser
//! - [`writer`]: MMDB serialization and file output
//! - [`database`]: memory-mapped reader used for verification
//! - [`file_reader`]: plain, gzip, or stdin sources

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod converter;
pub mod data_section;
pub mod database;
pub mod error;
pub mod file_reader;
pub mod mmdb;
pub mod network;
pub mod tree_builder;
pub mod writer;

pub use crate::catalog::{GeoRecord, RecordCatalog};
pub use crate::converter::{ConvertStats, Converter, Line, RangeSink};
pub use crate::data_section::DataValue;
pub use crate::database::{Database, DatabaseError, QueryResult};
pub use crate::error::ConvertError;
pub use crate::mmdb::{IpVersion, RecordSize};
pub use crate::network::{Network, ParseNetworkError};
pub use crate::writer::{write_database_file, MmdbWriter, WriterOptions, DEFAULT_DATABASE_TYPE};
