use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Engine settings, usually loaded from `seedsmith.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root seed used when a call does not supply one.
    pub default_seed: String,
    /// Values tried per scalar field while repairing a unique collision.
    pub max_scalar_attempts: usize,
    /// Deepest nesting of parent/child generation before giving up.
    pub max_depth: usize,
    /// Anchor for generated dates and timestamps.
    pub base_date: NaiveDate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_seed: "seedsmith".to_string(),
            max_scalar_attempts: 50,
            max_depth: 64,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
