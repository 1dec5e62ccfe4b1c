use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::normalize::Normalizer;
use crate::record::Record;

/// Column that always holds a timestamp in the source export, despite its name.
const LEGACY_TEMPORAL_COLUMN: &str = "D2";

/// Source column name to destination field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    /// Reads a JSON object of `"source column": "DestinationField"` pairs.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading field mapping from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::MappingRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::MappingFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds a new record holding only the mapped destination fields.
    ///
    /// Source columns missing from `record` are skipped rather than emitted empty. Temporal
    /// columns whose value looks like a date go through `normalizer`.
    pub fn apply(&self, record: &Record, normalizer: &Normalizer) -> Record {
        self.0
            .iter()
            .filter_map(|(source, dest)| {
                let value = record.get(source)?;
                let value = if is_temporal(source, dest) && looks_like_datetime(value) {
                    normalizer.normalize(value)
                } else {
                    value.to_string()
                };
                Some((dest.clone(), value))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn is_temporal(source: &str, dest: &str) -> bool {
    let mentions_time = |name: &str| {
        let name = name.to_lowercase();
        name.contains("date") || name.contains("time")
    };
    source == LEGACY_TEMPORAL_COLUMN || mentions_time(source) || mentions_time(dest)
}

fn looks_like_datetime(value: &str) -> bool {
    value.contains(['T', '-', '/'])
}
