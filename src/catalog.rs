//! Country record catalog
//!
//! Maps section tags (`CN`, `CF`, ...) to the country record attached to
//! every network listed under that section. The first entry is the default
//! record, used for networks that appear before any section header.

use crate::data_section::DataValue;
use crate::error::ConvertError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Country metadata stored for each inserted network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoRecord {
    /// ISO 3166-1 alpha-2 code
    pub iso_code: String,
    /// GeoNames identifier
    pub geoname_id: u32,
    /// EU membership flag
    pub is_in_european_union: bool,
    /// Localized country names keyed by language tag
    pub names: BTreeMap<String, String>,
}

impl GeoRecord {
    /// Build a record from a list of `(language, name)` pairs
    pub fn new(
        iso_code: &str,
        geoname_id: u32,
        is_in_european_union: bool,
        names: &[(&str, &str)],
    ) -> Self {
        Self {
            iso_code: iso_code.to_string(),
            geoname_id,
            is_in_european_union,
            names: names
                .iter()
                .map(|(lang, name)| (lang.to_string(), name.to_string()))
                .collect(),
        }
    }

    /// Encode as a GeoIP2-Country style `{"country": {...}}` map
    pub fn to_data_value(&self) -> DataValue {
        let names = self
            .names
            .iter()
            .map(|(lang, name)| (lang.clone(), DataValue::String(name.clone())))
            .collect();

        let mut country = BTreeMap::new();
        country.insert("geoname_id".to_string(), DataValue::Uint32(self.geoname_id));
        country.insert(
            "is_in_european_union".to_string(),
            DataValue::Bool(self.is_in_european_union),
        );
        country.insert(
            "iso_code".to_string(),
            DataValue::String(self.iso_code.clone()),
        );
        country.insert("names".to_string(), DataValue::Map(names));

        let mut root = BTreeMap::new();
        root.insert("country".to_string(), DataValue::Map(country));
        DataValue::Map(root)
    }
}

/// Immutable tag -> record mapping
#[derive(Debug, Clone)]
pub struct RecordCatalog {
    /// Entries in registration order; the first is the default
    entries: Vec<(String, Arc<GeoRecord>)>,
}

impl RecordCatalog {
    /// Build a catalog from ordered `(tag, record)` pairs
    ///
    /// Tags are matched case-insensitively. Fails on an empty list, blank
    /// tags, or duplicate tags.
    pub fn new<I, S>(entries: I) -> Result<Self, ConvertError>
    where
        I: IntoIterator<Item = (S, GeoRecord)>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let mut catalog = Vec::new();

        for (tag, record) in entries {
            let tag = tag.as_ref().trim().to_uppercase();
            if tag.is_empty() {
                return Err(ConvertError::Catalog("section tag is empty".to_string()));
            }
            if !seen.insert(tag.clone()) {
                return Err(ConvertError::Catalog(format!(
                    "duplicate section tag {}",
                    tag
                )));
            }
            catalog.push((tag, Arc::new(record)));
        }

        if catalog.is_empty() {
            return Err(ConvertError::Catalog(
                "catalog needs at least one record".to_string(),
            ));
        }

        Ok(Self { entries: catalog })
    }

    /// The two built-in country records, China first
    pub fn builtin() -> Self {
        let cn = GeoRecord::new(
            "CN",
            1_814_991,
            false,
            &[
                ("de", "China"),
                ("en", "China"),
                ("es", "China"),
                ("fr", "Chine"),
                ("ja", "中国"),
                ("pt-BR", "China"),
                ("ru", "Китай"),
                ("zh-CN", "中国"),
            ],
        );
        let cf = GeoRecord::new(
            "CF",
            1_814_989,
            false,
            &[
                ("de", "Centralafrikanische Republik"),
                ("en", "Central African Republic"),
                ("es", "República Centroafricana"),
                ("fr", "République centrafricaine"),
                ("ja", "中央アフリカ共和国"),
                ("pt-BR", "República Centro-Africana"),
                ("ru", "Центральноафриканская Республика"),
                ("zh-CN", "中非共和国"),
            ],
        );

        Self {
            entries: vec![
                ("CN".to_string(), Arc::new(cn)),
                ("CF".to_string(), Arc::new(cf)),
            ],
        }
    }

    /// Case-insensitive lookup
    pub fn get(&self, tag: &str) -> Option<&Arc<GeoRecord>> {
        self.entries
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(tag))
            .map(|(_, record)| record)
    }

    /// Record used before any section header is seen
    pub fn default_record(&self) -> &Arc<GeoRecord> {
        // `new` and `builtin` never produce an empty catalog
        &self.entries[0].1
    }

    /// Registered tags in order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(tag, _)| tag.as_str())
    }

    /// Sorted union of all name languages
    pub fn languages(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(_, record)| record.names.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of registered tags
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RecordCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_and_default() {
        let catalog = RecordCatalog::builtin();
        assert_eq!(catalog.tags().collect::<Vec<_>>(), vec!["CN", "CF"]);
        assert_eq!(catalog.default_record().iso_code, "CN");
        assert_eq!(catalog.default_record().geoname_id, 1_814_991);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = RecordCatalog::builtin();
        let upper = catalog.get("CF").unwrap();
        let lower = catalog.get("cf").unwrap();
        assert!(Arc::ptr_eq(upper, lower));
        assert_eq!(upper.names["en"], "Central African Republic");
        assert!(catalog.get("US").is_none());
        assert!(catalog.get("C F").is_none());
    }

    #[test]
    fn test_languages() {
        let catalog = RecordCatalog::builtin();
        assert_eq!(
            catalog.languages(),
            vec!["de", "en", "es", "fr", "ja", "pt-BR", "ru", "zh-CN"]
        );
    }

    #[test]
    fn test_custom_catalog() {
        let us = GeoRecord::new("US", 6_252_001, false, &[("en", "United States")]);
        let de = GeoRecord::new("DE", 2_921_044, true, &[("en", "Germany")]);
        let catalog = RecordCatalog::new(vec![("us", us), ("De", de)]).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.default_record().iso_code, "US");
        assert!(catalog.get("de").unwrap().is_in_european_union);
    }

    #[test]
    fn test_catalog_validation() {
        let rec = GeoRecord::new("US", 1, false, &[]);
        assert!(RecordCatalog::new(Vec::<(&str, GeoRecord)>::new()).is_err());
        assert!(RecordCatalog::new(vec![(" ", rec.clone())]).is_err());
        assert!(RecordCatalog::new(vec![("us", rec.clone()), ("US", rec)]).is_err());
    }

    #[test]
    fn test_to_data_value_shape() {
        let catalog = RecordCatalog::builtin();
        let value = catalog.default_record().to_data_value();
        let country = value.get("country").unwrap();

        assert_eq!(country.get("iso_code").and_then(DataValue::as_str), Some("CN"));
        assert_eq!(
            country.get("geoname_id").and_then(DataValue::as_u64),
            Some(1_814_991)
        );
        assert_eq!(
            country.get("is_in_european_union"),
            Some(&DataValue::Bool(false))
        );
        assert_eq!(
            country
                .get("names")
                .and_then(|n| n.get("ru"))
                .and_then(DataValue::as_str),
            Some("Китай")
        );
    }

    #[test]
    fn test_record_serializes_to_json() {
        let catalog = RecordCatalog::builtin();
        let json = serde_json::to_value(catalog.default_record().as_ref()).unwrap();
        assert_eq!(json["iso_code"], "CN");
        assert_eq!(json["names"]["zh-CN"], "中国");
    }
}
