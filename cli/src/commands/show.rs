use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use gummy_common::config::Config;
use gummy_core::catalog::PortCatalog;
use gummy_core::parser::Parser;
use gummy_core::ports::{PortPrioritizer, Weights};
use gummy_core::store::Store;
use gummy_core::vendors::MacOuiRepo;
use gummy_core::workspace::Workspace;

use crate::commands::View;
use crate::terminal::{print, table};

pub fn show(config: &Config, view: View, workspace: Option<&str>) -> anyhow::Result<()> {
    let root = &config.main.results_root;
    let name = match workspace {
        Some(name) => name.to_string(),
        None => latest_workspace(root)?,
    };
    let workspace = Workspace::open(root, &name)?;

    let mut parser = Parser::new().with_vendors(Arc::new(MacOuiRepo));
    let mut store = Store::new();
    workspace.restore(&mut parser, &mut store)?;

    print::header(&format!("workspace {name}"));
    render(view, &store, config);
    Ok(())
}

pub fn render(view: View, store: &Store, config: &Config) {
    if store.host_count() == 0 {
        print::no_results();
        return;
    }
    match view {
        View::Hosts => print::block(&table::hosts(&store.host_summary()).to_string()),
        View::Ports => {
            let prioritizer = PortPrioritizer::load(&config.main.data_dir, Weights::from(&config.ratings));
            let catalog = PortCatalog::load(&config.main.data_dir);
            print::block(&table::ports(&store.port_summary(&prioritizer, &catalog)).to_string());
        }
    }
}

/// The most recent workspace; default names are timestamps and sort by age.
fn latest_workspace(root: &Path) -> anyhow::Result<String> {
    let entries = fs::read_dir(root).with_context(|| format!("cannot read {}", root.display()))?;
    let latest = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .max();
    match latest {
        Some(name) => Ok(name),
        None => bail!("no workspace found in {}", root.display()),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_newest_workspace() {
        let root = tempfile::tempdir().unwrap();
        assert!(latest_workspace(root.path()).is_err());

        fs::create_dir(root.path().join("20250101-090000")).unwrap();
        fs::create_dir(root.path().join("20250301-120000")).unwrap();
        fs::write(root.path().join("20991231-000000"), "not a workspace").unwrap();

        assert_eq!(latest_workspace(root.path()).unwrap(), "20250301-120000");
    }
}
