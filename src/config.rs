//! Configuration for locating tables and their metadata
//!
//! Values come from built-in defaults, an optional TOML file, then
//! `DBC_*` environment variables. Front ends apply command line flags last.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dbc::{DecodeOptions, StringOffsetPolicy};

pub const ENV_DBC_PATH: &str = "DBC_PATH";
pub const ENV_FORMAT_FILE: &str = "DBC_FORMAT_FILE";
pub const ENV_FIELD_MAPPINGS: &str = "DBC_FIELD_MAPPINGS";

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbcConfig {
    /// Directory holding `<Name>.dbc` files
    #[serde(default = "default_dbc_path")]
    pub dbc_path: PathBuf,

    /// C++ header with the `<Name>fmt[]` format declarations
    #[serde(default = "default_format_file")]
    pub format_file: PathBuf,

    /// JSON field-name mappings
    #[serde(default)]
    pub field_mappings_file: Option<PathBuf>,

    #[serde(default)]
    pub string_offset_policy: StringOffsetPolicy,

    /// Cap on caller-supplied result limits
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

fn default_dbc_path() -> PathBuf {
    PathBuf::from("dbc")
}

fn default_format_file() -> PathBuf {
    PathBuf::from("DBCfmt.h")
}

fn default_max_limit() -> usize {
    1000
}

impl Default for DbcConfig {
    fn default() -> Self {
        Self {
            dbc_path: default_dbc_path(),
            format_file: default_format_file(),
            field_mappings_file: None,
            string_offset_policy: StringOffsetPolicy::default(),
            max_limit: default_max_limit(),
        }
    }
}

impl DbcConfig {
    /// Loads configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Defaults, overlaid by `path` when given, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `DBC_*` overrides looked up through `var`
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var(ENV_DBC_PATH) {
            self.dbc_path = PathBuf::from(path);
        }
        if let Some(path) = var(ENV_FORMAT_FILE) {
            self.format_file = PathBuf::from(path);
        }
        if let Some(path) = var(ENV_FIELD_MAPPINGS) {
            self.field_mappings_file = Some(PathBuf::from(path));
        }
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            string_offset_policy: self.string_offset_policy,
        }
    }
}
