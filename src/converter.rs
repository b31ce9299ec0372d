//! Section-aware IP list conversion
//!
//! The source format is line oriented:
//!
//! ```text
//! # networks before any header use the default record
//! 1.0.1.0/24
//!
//! [CF]
//! 41.78.124.0/22
//!
//! [cn]
//! 203.0.113.0/24
//! ```
//!
//! Blank lines are skipped. `[TAG]` switches the active record for the lines
//! that follow; unknown tags are logged and ignored. Every other line must be
//! a CIDR network and is handed to a [`RangeSink`] together with the active
//! record. The first malformed network aborts the conversion.

use crate::catalog::{GeoRecord, RecordCatalog};
use crate::error::ConvertError;
use crate::network::Network;
use std::io::BufRead;
use std::sync::Arc;

/// Destination for `(network, record)` pairs
///
/// [`crate::writer::MmdbWriter`] is the real implementation; tests use an
/// in-memory recorder.
pub trait RangeSink {
    /// Accept one network tagged with its record
    fn insert(&mut self, network: &Network, record: &GeoRecord) -> Result<(), ConvertError>;
}

impl<S: RangeSink + ?Sized> RangeSink for &mut S {
    fn insert(&mut self, network: &Network, record: &GeoRecord) -> Result<(), ConvertError> {
        (**self).insert(network, record)
    }
}

/// Collects every pair it receives
impl RangeSink for Vec<(Network, GeoRecord)> {
    fn insert(&mut self, network: &Network, record: &GeoRecord) -> Result<(), ConvertError> {
        self.push((*network, record.clone()));
        Ok(())
    }
}

/// Classification of one trimmed source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty after trimming
    Blank,
    /// `[...]` with the bracket interior, not yet uppercased
    Section(&'a str),
    /// Anything else, expected to be a CIDR literal
    Network(&'a str),
}

impl<'a> Line<'a> {
    /// Classify a raw line
    pub fn classify(raw: &'a str) -> Self {
        let line = raw.trim();
        if line.is_empty() {
            Line::Blank
        } else if let Some(tag) = line
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            Line::Section(tag)
        } else {
            Line::Network(line)
        }
    }
}

/// Counters for one conversion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// Lines read, including blank and header lines
    pub lines: usize,
    /// Networks handed to the sink
    pub ranges: usize,
    /// Recognized section headers
    pub sections: usize,
    /// Unknown section headers that were skipped
    pub unknown_sections: usize,
}

/// Drives the line parser over a catalog
pub struct Converter {
    catalog: RecordCatalog,
}

impl Converter {
    /// Create a converter over `catalog`
    pub fn new(catalog: RecordCatalog) -> Self {
        Self { catalog }
    }

    /// The catalog section headers are resolved against
    pub fn catalog(&self) -> &RecordCatalog {
        &self.catalog
    }

    /// Parse `reader` and insert every network into `sink`
    ///
    /// Stops at the first malformed network, failed insert, or read error.
    pub fn convert<R, S>(&self, reader: R, mut sink: S) -> Result<ConvertStats, ConvertError>
    where
        R: BufRead,
        S: RangeSink,
    {
        let mut stats = ConvertStats::default();
        let mut active: Arc<GeoRecord> = Arc::clone(self.catalog.default_record());

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                ConvertError::Io(format!("error reading line {}: {}", index + 1, e))
            })?;
            stats.lines += 1;

            match Line::classify(&line) {
                Line::Blank => {}
                Line::Section(raw_tag) => {
                    let tag = raw_tag.to_uppercase();
                    match self.catalog.get(&tag) {
                        Some(record) => {
                            log::debug!("line {}: switching to section {}", index + 1, tag);
                            active = Arc::clone(record);
                            stats.sections += 1;
                        }
                        None => {
                            log::warn!("unknown section {}, skip", tag);
                            stats.unknown_sections += 1;
                        }
                    }
                }
                Line::Network(literal) => {
                    let network = literal.parse::<Network>().map_err(|e| {
                        ConvertError::InvalidCidr {
                            line_number: index + 1,
                            line: literal.to_string(),
                            reason: e.to_string(),
                        }
                    })?;

                    sink.insert(&network, &active).map_err(|e| match e {
                        ConvertError::Insert(msg) => {
                            ConvertError::Insert(format!("failed to insert {}: {}", literal, msg))
                        }
                        other => other,
                    })?;
                    log::trace!("inserted {} as {}", network, active.iso_code);
                    stats.ranges += 1;
                }
            }
        }

        log::debug!(
            "parsed {} lines: {} ranges, {} sections, {} unknown sections",
            stats.lines,
            stats.ranges,
            stats.sections,
            stats.unknown_sections
        );
        Ok(stats)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(RecordCatalog::builtin())
    }
}
