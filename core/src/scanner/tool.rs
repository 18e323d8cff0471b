use std::path::{Path, PathBuf};
use std::process::Stdio;

use gummy_common::model::ToolKind;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} was not found at {path}")]
    Unavailable { tool: ToolKind, path: PathBuf },
    #[error("could not read the {tool} version from {path}: {output:?}")]
    VersionUnparseable {
        tool: ToolKind,
        path: PathBuf,
        output: String,
    },
}

/// A scanner executable whose version has been confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub kind: ToolKind,
    pub path: PathBuf,
    pub version: String,
}

impl Tool {
    pub fn new(kind: ToolKind, path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            version: version.into(),
        }
    }

    /// Resolves `path` and checks that `<path> -V` prints the expected banner.
    pub async fn locate(kind: ToolKind, path: &Path) -> Result<Self, ToolError> {
        let resolved = which::which(path).map_err(|_| {
            warn!("{kind} was not found");
            ToolError::Unavailable {
                tool: kind,
                path: path.to_path_buf(),
            }
        })?;

        let output = Command::new(&resolved)
            .arg("-V")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|_| ToolError::Unavailable {
                tool: kind,
                path: resolved.clone(),
            })?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        let Some(version) = parse_version(kind, &text) else {
            return Err(ToolError::VersionUnparseable {
                tool: kind,
                path: resolved,
                output: text.trim().to_string(),
            });
        };

        info!("Use: {} (Version {version})", resolved.display());
        Ok(Self::new(kind, resolved, version))
    }
}

/// Extracts `<v>` from a `Masscan version <v>` / `Nmap version <v>` banner.
pub fn parse_version(kind: ToolKind, output: &str) -> Option<String> {
    let pattern = format!(r"{} (?P<version>\d[\w.\-]*)", regex::escape(kind.version_banner()));
    let re = Regex::new(&pattern).ok()?;
    re.captures(output).map(|caps| caps["version"].to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
