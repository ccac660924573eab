//! Scenario classification metadata stored next to each scenario file.

use log::debug;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::MetadataError;
use crate::scenario::ScenarioReference;

const SEPARATOR: &str = " = ";

/// Parsed `.properties` file of one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioMetadata {
    pub dynamism: f64,
    pub urgency: i64,
    pub scale: f64,
    pub num_orders: i64,
    /// Every key of the file, including the ones above.
    pub properties: BTreeMap<String, String>,
}

impl ScenarioMetadata {
    pub const DYNAMISM_KEY: &'static str = "dynamism_bin";
    pub const URGENCY_KEY: &'static str = "urgency";
    pub const SCALE_KEY: &'static str = "scale";
    pub const ORDERS_KEY: &'static str = "AddParcelEvent";

    /// Parse `key = value` lines. `source_name` only labels errors.
    ///
    /// # Errors
    ///
    /// Fails on a non-blank line without ` = `, a repeated key, or a required
    /// key that is missing or does not parse.
    pub fn parse(text: &str, source_name: &str) -> Result<Self, MetadataError> {
        let mut properties = BTreeMap::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(SEPARATOR) else {
                return Err(MetadataError::Malformed {
                    line: idx + 1,
                    source_name: source_name.to_string(),
                });
            };
            if properties
                .insert(key.trim().to_string(), value.trim().to_string())
                .is_some()
            {
                return Err(MetadataError::DuplicateKey {
                    key: key.trim().to_string(),
                    source_name: source_name.to_string(),
                });
            }
        }

        Ok(Self {
            dynamism: required(&properties, Self::DYNAMISM_KEY, source_name)?,
            urgency: required(&properties, Self::URGENCY_KEY, source_name)?,
            scale: required(&properties, Self::SCALE_KEY, source_name)?,
            num_orders: required(&properties, Self::ORDERS_KEY, source_name)?,
            properties,
        })
    }
}

fn required<T: FromStr>(
    properties: &BTreeMap<String, String>,
    key: &'static str,
    source_name: &str,
) -> Result<T, MetadataError> {
    let raw = properties.get(key).ok_or_else(|| MetadataError::MissingKey {
        key,
        source_name: source_name.to_string(),
    })?;
    raw.parse().map_err(|_| MetadataError::InvalidValue {
        key,
        value: raw.clone(),
        source_name: source_name.to_string(),
    })
}

/// Loads scenario metadata on demand, reading each file at most once.
#[derive(Debug, Default)]
pub struct MetadataJoiner {
    cache: HashMap<PathBuf, ScenarioMetadata>,
}

impl MetadataJoiner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata of `scenario`, read from its companion file on first use.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::MissingFile`] if the file cannot be read, or
    /// any parse error from [`ScenarioMetadata::parse`].
    pub fn metadata_for(
        &mut self,
        scenario: &ScenarioReference,
    ) -> Result<&ScenarioMetadata, MetadataError> {
        let path = scenario.metadata_path();
        match self.cache.entry(path.to_path_buf()) {
            Entry::Occupied(cached) => Ok(cached.into_mut()),
            Entry::Vacant(slot) => {
                let text =
                    fs::read_to_string(path).map_err(|source| MetadataError::MissingFile {
                        path: path.to_path_buf(),
                        source,
                    })?;
                let source_name = path.file_name().map_or_else(
                    || path.display().to_string(),
                    |n| n.to_string_lossy().into_owned(),
                );
                let metadata = ScenarioMetadata::parse(&text, &source_name)?;
                debug!("loaded metadata for {}", scenario.scenario_id());
                Ok(slot.insert(metadata))
            }
        }
    }

    /// Number of metadata files read so far.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.cache.len()
    }
}
