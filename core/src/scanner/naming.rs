use std::path::{Path, PathBuf};

use gummy_common::model::ToolKind;

const TARGET_LABEL_LEN: usize = 17;

/// Makes a target usable inside a file name: `.` becomes `-`, `/` becomes
/// `#`, and anything past 17 characters is cut and marked with `...`.
pub fn sanitize_target(target: &str) -> String {
    let sanitized: String = target
        .chars()
        .map(|c| match c {
            '.' => '-',
            '/' => '#',
            other => other,
        })
        .collect();

    if sanitized.chars().count() > TARGET_LABEL_LEN {
        let head: String = sanitized.chars().take(TARGET_LABEL_LEN).collect();
        format!("{head}...")
    } else {
        sanitized
    }
}

/// `{seq:03}-{tag}-{label}-[{target}]`, the common stem of a run's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    stem: String,
}

impl ArtifactName {
    pub fn new(seq: usize, tool: ToolKind, label: &str, target: Option<&str>) -> Self {
        let target = target.map(sanitize_target).unwrap_or_default();
        Self {
            stem: format!("{seq:03}-{}-{label}-[{target}]", tool.tag()),
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn path(&self, dir: &Path, suffix: &str) -> PathBuf {
        dir.join(format!("{}{suffix}", self.stem))
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
