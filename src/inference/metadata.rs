//! Disease advisory table
//!
//! Static, human-readable information keyed by class name. A class without an
//! entry is reported with status `Unknown` and no advice.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::error::{PlantDocError, Result};

/// Advisory table shipped with the binary (PlantVillage classes)
const BUILTIN_TABLE: &str = include_str!("../../assets/disease_info.json");

/// Health status of a diagnosed leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
            HealthStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Advisory entry for one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    /// Display name of the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(default)]
    pub causes: Vec<String>,
    #[serde(default)]
    pub prevention: Vec<String>,
}

/// Class name → advisory entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiseaseTable {
    records: BTreeMap<String, DiseaseRecord>,
}

impl DiseaseTable {
    /// Load a table from a JSON file
    ///
    /// A missing file yields an empty table, so every lookup falls back to
    /// `Unknown`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            warn!("Metadata table not found at {:?}; diagnoses will be 'Unknown'", path);
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)?;
        let table: Self = serde_json::from_str(&json).map_err(|e| {
            PlantDocError::Serialization(format!("Invalid metadata table {}: {}", path.display(), e))
        })?;
        debug!("Loaded {} metadata entries from {:?}", table.len(), path);
        Ok(table)
    }

    /// The advisory table embedded in the binary
    pub fn builtin() -> Result<Self> {
        Ok(serde_json::from_str(BUILTIN_TABLE)?)
    }

    /// Write the table as pretty-printed JSON
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, class_name: &str) -> Option<&DiseaseRecord> {
        self.records.get(class_name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
