// src/config.rs
//! Studio configuration. Every field has a default, so a partial JSON file
//! (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{default_models, default_patterns, ModelEntry, PatternEntry, DEFAULT_PATTERN_BASE_URL};
use crate::color::PartOptions;
use crate::error::{Result, StudioError};
use crate::resolver::MaterialAliases;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Directory that asset and texture URLs resolve against.
    pub asset_root: PathBuf,
    pub models: Vec<ModelEntry>,
    pub patterns: Vec<PatternEntry>,
    pub pattern_base_url: String,
    pub aliases: MaterialAliases,
    pub part_options: PartOptions,
    pub load_timeout_ms: u64,
    pub auto_cycle_interval_ms: u64,
    /// Textures kept per viewer.
    pub texture_cache_capacity: usize,
    /// Where `JsonFileStore` keeps the selection; in-memory when unset.
    pub storage_path: Option<PathBuf>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            models: default_models(),
            patterns: default_patterns(),
            pattern_base_url: DEFAULT_PATTERN_BASE_URL.to_string(),
            aliases: MaterialAliases::default(),
            part_options: PartOptions::default(),
            load_timeout_ms: 10_000, // 50 polls x 200ms
            auto_cycle_interval_ms: 4_000,
            texture_cache_capacity: 64,
            storage_path: None,
        }
    }
}

impl StudioConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StudioError::from(e).context(format!("reading {}", path.display())))?;
        Self::from_json_str(&text).map_err(|e| e.context(format!("parsing {}", path.display())))
    }

    #[inline]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    #[inline]
    pub fn auto_cycle_interval(&self) -> Duration {
        Duration::from_millis(self.auto_cycle_interval_ms)
    }

    pub fn pattern_urls(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.src.clone()).collect()
    }
}
