//! MMDB database writer
//!
//! Collects `(network, value)` pairs into a search tree and a deduplicated
//! data section, then serializes them as a complete MaxMind DB file:
//!
//! ```text
//! search tree | 16 zero bytes | data section | \xAB\xCD\xEFMaxMind.com | metadata
//! ```

use crate::catalog::GeoRecord;
use crate::converter::RangeSink;
use crate::data_section::{DataEncoder, DataValue};
use crate::error::ConvertError;
use crate::mmdb::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR, METADATA_MARKER};
use crate::network::Network;
use crate::tree_builder::TreeBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Database type written when none is configured
pub const DEFAULT_DATABASE_TYPE: &str = "GeoIP2-Country";

/// Output settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// `database_type` metadata value
    pub database_type: String,
    /// Bits per search tree record
    pub record_size: RecordSize,
    /// Address family of the search tree
    pub ip_version: IpVersion,
    /// `languages` metadata value
    pub languages: Vec<String>,
    /// `description` metadata map, language -> text
    pub description: BTreeMap<String, String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            database_type: DEFAULT_DATABASE_TYPE.to_string(),
            record_size: RecordSize::default(),
            ip_version: IpVersion::default(),
            languages: Vec::new(),
            description: BTreeMap::new(),
        }
    }
}

impl WriterOptions {
    /// Set the database type
    pub fn with_database_type(mut self, database_type: impl Into<String>) -> Self {
        self.database_type = database_type.into();
        self
    }

    /// Set the record size
    pub fn with_record_size(mut self, record_size: RecordSize) -> Self {
        self.record_size = record_size;
        self
    }

    /// Set the tree address family
    pub fn with_ip_version(mut self, ip_version: IpVersion) -> Self {
        self.ip_version = ip_version;
        self
    }

    /// Set the languages advertised in the metadata
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Add a description in one language
    pub fn with_description(
        mut self,
        language: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.description.insert(language.into(), text.into());
        self
    }
}

/// In-memory MMDB under construction
pub struct MmdbWriter {
    options: WriterOptions,
    tree: TreeBuilder,
    data: DataEncoder,
    inserted: usize,
}

impl MmdbWriter {
    /// Create an empty writer
    pub fn new(options: WriterOptions) -> Result<Self, ConvertError> {
        if options.database_type.trim().is_empty() {
            return Err(ConvertError::Writer(
                "database type must not be empty".to_string(),
            ));
        }

        let tree = TreeBuilder::new(options.ip_version, options.record_size);
        Ok(Self {
            options,
            tree,
            data: DataEncoder::new(),
            inserted: 0,
        })
    }

    /// Associate `network` with `value`
    ///
    /// Identical values share one data section entry.
    pub fn insert(&mut self, network: &Network, value: &DataValue) -> Result<(), ConvertError> {
        let offset = self
            .data
            .encode(value)
            .map_err(|e| ConvertError::Writer(format!("failed to encode data: {}", e)))?;
        self.tree.insert(network, offset)?;
        self.inserted += 1;
        Ok(())
    }

    /// Number of networks inserted
    pub fn len(&self) -> usize {
        self.inserted
    }

    /// Whether nothing has been inserted
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Search tree nodes allocated so far
    pub fn node_count(&self) -> u32 {
        self.tree.node_count()
    }

    /// Bytes in the data section so far
    pub fn data_section_len(&self) -> usize {
        self.data.len()
    }

    /// Serialize the database into `out`, returning the bytes written
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<usize, ConvertError> {
        let (tree, node_count) = self.tree.build()?;
        let metadata = self.metadata(node_count)?;

        out.write_all(&tree)?;
        out.write_all(&[0u8; DATA_SECTION_SEPARATOR])?;
        out.write_all(self.data.as_bytes())?;
        out.write_all(METADATA_MARKER)?;
        out.write_all(&metadata)?;

        Ok(tree.len() + DATA_SECTION_SEPARATOR + self.data.len() + METADATA_MARKER.len()
            + metadata.len())
    }

    /// Serialize the database into a fresh buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConvertError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    fn metadata(&self, node_count: u32) -> Result<Vec<u8>, ConvertError> {
        let build_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let description = self
            .options
            .description
            .iter()
            .map(|(lang, text)| (lang.clone(), DataValue::String(text.clone())))
            .collect();
        let languages = self
            .options
            .languages
            .iter()
            .map(|lang| DataValue::String(lang.clone()))
            .collect();

        let mut map = BTreeMap::new();
        map.insert(
            "binary_format_major_version".to_string(),
            DataValue::Uint16(2),
        );
        map.insert(
            "binary_format_minor_version".to_string(),
            DataValue::Uint16(0),
        );
        map.insert("build_epoch".to_string(), DataValue::Uint64(build_epoch));
        map.insert(
            "database_type".to_string(),
            DataValue::String(self.options.database_type.clone()),
        );
        map.insert("description".to_string(), DataValue::Map(description));
        map.insert("languages".to_string(), DataValue::Array(languages));
        map.insert(
            "ip_version".to_string(),
            DataValue::Uint16(self.options.ip_version.metadata_value()),
        );
        map.insert("node_count".to_string(), DataValue::Uint32(node_count));
        map.insert(
            "record_size".to_string(),
            DataValue::Uint16(self.options.record_size.bits()),
        );

        crate::data_section::encode_value(&DataValue::Map(map))
            .map_err(|e| ConvertError::Writer(format!("failed to encode metadata: {}", e)))
    }
}

impl RangeSink for MmdbWriter {
    fn insert(&mut self, network: &Network, record: &GeoRecord) -> Result<(), ConvertError> {
        MmdbWriter::insert(self, network, &record.to_data_value())
    }
}

/// Write `writer` to `path`, creating or truncating it
///
/// Returns the number of bytes written.
pub fn write_database_file<P: AsRef<Path>>(
    path: P,
    writer: &MmdbWriter,
) -> Result<u64, ConvertError> {
    let path = path.as_ref();
    let io_err = |e: std::io::Error| ConvertError::Io(format!("{}: {}", path.display(), e));

    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    let written = writer.write_to(&mut out).map_err(|e| match e {
        ConvertError::Io(msg) => ConvertError::Io(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;
    out.flush().map_err(io_err)?;

    Ok(written as u64)
}
