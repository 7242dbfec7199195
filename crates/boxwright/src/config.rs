//! TOML project configuration.
//!
//! ```toml
//! [dimensions]
//! x_len = 400.0
//! y_len = 200.0
//! z_len = 200.0
//!
//! [dimensions.attributes]
//! mat_thickness = 9.0
//!
//! [part_types.bottom]
//! extents = [380.0, 180.0, 9.0]
//!
//! [part_types.bottom.attributes]
//! mat_thickness = 9.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dimensions::{
    Attributes, DimensionProvider, DimensionStore, GlobalDimensions, PartTypeTable, RawDimensions,
};
use crate::error::Result;
use crate::normalized::NormalizedMap;

/// Dimensions of one configured part type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartTypeConfig {
    /// `[x, y, z]`; validated when the store is built.
    pub extents: serde_json::Value,
    /// Extra attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

/// A whole project: global dimensions plus fixed part type dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Global dimensions and attributes.
    pub dimensions: GlobalDimensions,
    /// Part type dimensions by name.
    #[serde(default)]
    pub part_types: NormalizedMap<PartTypeConfig>,
}

impl ProjectConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading project configuration");
        Self::from_toml_str(&text)
    }

    /// Build a dimension store from this configuration.
    pub fn into_store(self) -> Result<DimensionStore<ConfiguredPartTypes>> {
        DimensionStore::from_config(self)
    }
}

/// Dimension provider backed by configured part types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfiguredPartTypes {
    part_types: NormalizedMap<PartTypeConfig>,
}

impl ConfiguredPartTypes {
    /// Wrap configured part types.
    pub fn new(part_types: NormalizedMap<PartTypeConfig>) -> Self {
        Self { part_types }
    }
}

impl DimensionProvider for ConfiguredPartTypes {
    fn part_types(&self, _globals: &GlobalDimensions) -> Result<PartTypeTable> {
        let mut table = PartTypeTable::new();
        for (key, config) in &self.part_types {
            let (extents, _) = RawDimensions::Untyped(config.extents.clone()).into_parts(key.as_str())?;
            table.insert(key, RawDimensions::WithAttributes(extents, config.attributes.clone()))?;
        }
        Ok(table)
    }
}

impl DimensionStore<ConfiguredPartTypes> {
    /// Build a store from a parsed configuration.
    pub fn from_config(config: ProjectConfig) -> Result<Self> {
        Self::new(config.dimensions, ConfiguredPartTypes::new(config.part_types))
    }
}
