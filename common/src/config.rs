//! # Runtime Configuration
//!
//! Settings are read from a TOML file. Every section and key is optional;
//! anything missing falls back to [`Config::default`]. Command line flags are
//! applied on top by the CLI.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::InspectionMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("configuration file {path} is invalid: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub main: MainConfig,
    pub logging: LoggingConfig,
    pub masscan: MasscanConfig,
    pub nmap: NmapConfig,
    pub ratings: RatingsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Directory holding one sub-directory per workspace.
    pub results_root: PathBuf,
    pub masscan_path: PathBuf,
    pub nmap_path: PathBuf,
    /// Directory with the port rating and description catalogs.
    pub data_dir: PathBuf,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            results_root: PathBuf::from("scans"),
            masscan_path: PathBuf::from("/usr/bin/masscan"),
            nmap_path: PathBuf::from("/usr/bin/nmap"),
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `gummy_core=debug`.
    pub level: String,
    /// Plain-text copy of every event, without colors.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasscanConfig {
    /// Target range; `auto` resolves to the LAN of the primary interface.
    pub target: String,
    pub target_exclude: Option<String>,
    /// Compact port list for manual scans, e.g. `22,80,8000-8100`.
    pub port: Option<String>,
    pub top_ports: Option<u32>,
    pub rate: Option<u32>,
}

impl Default for MasscanConfig {
    fn default() -> Self {
        Self {
            target: String::from("auto"),
            target_exclude: None,
            port: None,
            top_ports: None,
            rate: Some(10_000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmapConfig {
    pub scan_type: InspectionMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingsConfig {
    /// Weight of the normalized nmap popularity list.
    pub native_weight: f64,
    /// Weight of the normalized usage statistics list.
    pub empirical_weight: f64,
}

impl Default for RatingsConfig {
    fn default() -> Self {
        Self {
            native_weight: 0.3,
            empirical_weight: 0.7,
        }
    }
}

impl Config {
    /// Loads `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Configuration file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        fs::write(path, raw).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
