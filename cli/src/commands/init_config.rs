use std::path::Path;

use anyhow::{Context, bail};
use gummy_common::config::Config;

use crate::terminal::print;

pub fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite it", path.display());
    }
    Config::default()
        .save(path)
        .with_context(|| format!("cannot write the default configuration to {}", path.display()))?;
    print::print_status(format!("Default configuration written to {}", path.display()));
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gummy.toml");

        init_config(&path, false).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());

        std::fs::write(&path, "[masscan]\nrate = 1\n").unwrap();
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
        assert_eq!(Config::load(&path).unwrap().masscan.rate, Some(10_000));
    }
}
