//! Thumbnailer configuration module.
//!
//! Handles loading, validating, and merging `config.toml` files. A user file
//! is a sparse overlay: it is merged key-by-key onto the stock defaults, so
//! it only needs the values it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [directory]
//! cache_dir_name = ".thumbnails"                  # Subdirectory holding pre-rendered sizes
//! extensions = ["png", "jpg", "jpeg", "svg", "svgz"]
//!
//! [archive]
//! preview_entries = [                            # Tried in order, first match wins
//!     "Thumbnails/Thumbnail.png",
//!     "thumbnails/Thumbnail.png",
//!     "Thumbnail.png",
//! ]
//!
//! [limits]
//! max_source_bytes = 25165824                    # 24 MiB
//!
//! [[flavors]]
//! name = "normal"
//! size = 128
//!
//! [processing]
//! max_processes = 4         # Max parallel jobs (omit for auto = CPU cores)
//! ```
//!
//! Arrays are replaced, not merged: a user file with any `[[flavors]]`
//! entry replaces the whole stock flavor list.
//!
//! Unknown keys are rejected to catch typos early.

use crate::request::Flavor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Thumbnailer configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbsConfig {
    /// Pre-rendered directory thumbnails.
    pub directory: DirectoryConfig,
    /// Embedded previews in document archives.
    pub archive: ArchiveConfig,
    /// Input size limits.
    pub limits: LimitsConfig,
    /// Named output sizes.
    pub flavors: Vec<FlavorConfig>,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for ThumbsConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryConfig::default(),
            archive: ArchiveConfig::default(),
            limits: LimitsConfig::default(),
            flavors: default_flavors(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl ThumbsConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dir_name = &self.directory.cache_dir_name;
        if dir_name.is_empty() || dir_name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "directory.cache_dir_name must be a single path component".into(),
            ));
        }
        if self.directory.extensions.is_empty()
            || self.directory.extensions.iter().any(|e| e.is_empty())
        {
            return Err(ConfigError::Validation(
                "directory.extensions must be a non-empty list of extensions".into(),
            ));
        }
        if self.archive.preview_entries.is_empty() {
            return Err(ConfigError::Validation(
                "archive.preview_entries must not be empty".into(),
            ));
        }
        if self.limits.max_source_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_source_bytes must be non-zero".into(),
            ));
        }
        if self.flavors.is_empty() {
            return Err(ConfigError::Validation("flavors must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for flavor in &self.flavors {
            if flavor.name.is_empty() || flavor.name.contains(['/', '\\']) || flavor.name == ".."
            {
                return Err(ConfigError::Validation(format!(
                    "flavor name {:?} must be a single path component",
                    flavor.name
                )));
            }
            if flavor.size == 0 {
                return Err(ConfigError::Validation(format!(
                    "flavor {} must have a non-zero size",
                    flavor.name
                )));
            }
            if !seen.insert(flavor.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "flavor {} is defined more than once",
                    flavor.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a configured flavor by name.
    pub fn flavor(&self, name: &str) -> Option<Flavor> {
        self.flavors
            .iter()
            .find(|f| f.name == name)
            .map(FlavorConfig::to_flavor)
    }
}

/// `.thumbnails` directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Name of the subdirectory holding `<size>.<ext>` images.
    pub cache_dir_name: String,
    /// Accepted image extensions, matched case-insensitively.
    pub extensions: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cache_dir_name: ".thumbnails".to_string(),
            extensions: ["png", "jpg", "jpeg", "svg", "svgz"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Archive preview settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Entry names tried in order; the first present entry is the preview.
    pub preview_entries: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            preview_entries: vec![
                "Thumbnails/Thumbnail.png".to_string(),
                "thumbnails/Thumbnail.png".to_string(),
                "Thumbnail.png".to_string(),
            ],
        }
    }
}

/// Input size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest source image or archive entry accepted, in bytes.
    pub max_source_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_source_bytes: 24 * 1024 * 1024,
        }
    }
}

/// A named square output size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlavorConfig {
    pub name: String,
    pub size: u32,
}

impl FlavorConfig {
    pub fn to_flavor(&self) -> Flavor {
        Flavor::square(self.name.clone(), self.size)
    }
}

fn default_flavors() -> Vec<FlavorConfig> {
    [
        ("normal", 128),
        ("large", 256),
        ("x-large", 512),
        ("xx-large", 1024),
    ]
    .iter()
    .map(|&(name, size)| FlavorConfig {
        name: name.to_string(),
        size,
    })
    .collect()
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail jobs.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ThumbsConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ThumbsConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ThumbsConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective configuration.
///
/// With no path the stock defaults are used. An explicitly named file that
/// does not exist is an error.
pub fn load_config(config_path: Option<&Path>) -> Result<ThumbsConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match config_path {
        Some(path) => Some(load_raw_config(path)?.ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", path.display()),
            ))
        })?),
        None => None,
    };
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# embedded-thumbs configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directory thumbnails
# ---------------------------------------------------------------------------
[directory]
# Subdirectory of a folder holding pre-rendered images named <size>.<ext>,
# e.g. .thumbnails/128.png. The best fit for the requested size is used.
cache_dir_name = ".thumbnails"

# Image extensions considered (case-insensitive).
extensions = ["png", "jpg", "jpeg", "svg", "svgz"]

# ---------------------------------------------------------------------------
# Document archives (FreeCAD .FCStd)
# ---------------------------------------------------------------------------
[archive]
# Archive entries tried in order; the first one present is the preview.
preview_entries = [
    "Thumbnails/Thumbnail.png",
    "thumbnails/Thumbnail.png",
    "Thumbnail.png",
]

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest source image or embedded preview accepted, in bytes (24 MiB).
max_source_bytes = 25165824

# ---------------------------------------------------------------------------
# Flavors
# ---------------------------------------------------------------------------
# Named output sizes. Thumbnails fit a size x size box and are never
# upscaled. Defining any flavor replaces this whole list.
[[flavors]]
name = "normal"
size = 128

[[flavors]]
name = "large"
size = 256

[[flavors]]
name = "x-large"
size = 512

[[flavors]]
name = "xx-large"
size = 1024

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel thumbnail jobs. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4
"##
}
