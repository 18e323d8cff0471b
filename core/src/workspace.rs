//! # Session Workspace
//!
//! Every session writes its artifacts to `<results_root>/<name>`. A workspace
//! can be re-opened later: the XML reports found there are parsed again, the
//! run counter continues after the highest sequence number on disk and the
//! staged workflow picks up after the last stage its artifacts record.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{DateTime, Local, Utc};
use gummy_common::config::{Config, ConfigError};
use gummy_common::model::ToolKind;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::orchestrator::{Stage, StageProgress};
use crate::parser::Parser;
use crate::store::{Batch, Store};

pub const START_CONFIG: &str = "start_config.toml";
/// Arming time of the stage-1 restart window.
pub const RESTART_MARK: &str = "restart.armed";

static REPORT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<seq>\d{3,})-(?P<tag>[mn])-.*\.xml$").expect("valid report pattern"));
static ARTIFACT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<seq>\d{3,})-(?P<tag>[mn])-(?P<label>[^-\[]+)-\[").expect("valid artifact pattern")
});

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace {0} does not exist")]
    NotFound(PathBuf),
    #[error("workspace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An XML report found in a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub seq: usize,
    pub tool: ToolKind,
    pub path: PathBuf,
}

/// What re-opening a workspace restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub reports: usize,
    /// Highest sequence number on disk, 0 for a fresh workspace.
    pub last_seq: usize,
}

/// Any file named by a run: `{seq}-{tag}-{label}-[{target}]...`.
#[derive(Debug)]
struct Artifact {
    seq: usize,
    label: String,
    path: PathBuf,
}

impl Artifact {
    fn of(&self, stage: Stage, extension: &str, after: usize) -> bool {
        self.label == stage.label()
            && self.seq > after
            && self.path.extension().is_some_and(|ext| ext == extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Default workspace name: the local start time.
    pub fn default_name() -> String {
        Local::now().format("%Y%m%d-%H%M%S").to_string()
    }

    /// Creates `<results_root>/<name>` if needed.
    pub fn create(results_root: &Path, name: Option<&str>) -> Result<Self, WorkspaceError> {
        let name = name.map(String::from).unwrap_or_else(Self::default_name);
        let path = results_root.join(name);
        fs::create_dir_all(&path).map_err(|source| WorkspaceError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Workspace {}", path.display());
        Ok(Self { path })
    }

    /// Opens an existing workspace.
    pub fn open(results_root: &Path, name: &str) -> Result<Self, WorkspaceError> {
        let path = results_root.join(name);
        if !path.is_dir() {
            return Err(WorkspaceError::NotFound(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save_config(&self, config: &Config) -> Result<(), WorkspaceError> {
        config.save(&self.path.join(START_CONFIG))?;
        Ok(())
    }

    /// XML reports in this workspace, masscan reports first, each group
    /// sorted by file name.
    pub fn reports(&self) -> Result<Vec<ReportFile>, WorkspaceError> {
        let entries = fs::read_dir(&self.path).map_err(|source| WorkspaceError::Io {
            path: self.path.clone(),
            source,
        })?;

        let mut reports: Vec<ReportFile> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let caps = REPORT_NAME.captures(&name)?;
                let tool = match &caps["tag"] {
                    "m" => ToolKind::Masscan,
                    _ => ToolKind::Nmap,
                };
                Some(ReportFile {
                    seq: caps["seq"].parse().ok()?,
                    tool,
                    path: entry.path(),
                })
            })
            .collect();

        reports.sort_by(|a, b| {
            (a.tool != ToolKind::Masscan, &a.path).cmp(&(b.tool != ToolKind::Masscan, &b.path))
        });
        Ok(reports)
    }

    fn artifacts(&self) -> Result<Vec<Artifact>, WorkspaceError> {
        let entries = fs::read_dir(&self.path).map_err(|source| WorkspaceError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let caps = ARTIFACT_NAME.captures(&name)?;
                Some(Artifact {
                    seq: caps["seq"].parse().ok()?,
                    label: caps["label"].to_string(),
                    path: entry.path(),
                })
            })
            .collect())
    }

    /// Rebuilds the staged-workflow progress from the artifacts on disk.
    ///
    /// Stages 1, 2 and 4 count as completed once they wrote their host list,
    /// stage 3 once it wrote an inspection report, each newer than the
    /// artifacts of the stage before it. The sweeps of stages 1 and 2 are
    /// read again into the intermediate result.
    pub fn stage_progress(&self) -> Result<StageProgress, WorkspaceError> {
        let artifacts = self.artifacts()?;
        let latest = |stage: Stage, extension: &str, after: usize| {
            artifacts
                .iter()
                .filter(|artifact| artifact.of(stage, extension, after))
                .max_by_key(|artifact| artifact.seq)
        };

        let mut progress = StageProgress::default();
        let Some(discovery) = latest(Stage::Discovery, "host", 0) else {
            return Ok(progress);
        };
        // a private parser keeps these reads out of the session history
        let mut parser = Parser::new();
        let mut sweeps = vec![sweep_batch(&mut parser, &discovery.path)];
        progress.set_hosts_file(discovery.path.clone());
        progress.mark(Stage::Discovery);

        if let Some(remainder) = latest(Stage::Remainder, "host", discovery.seq) {
            sweeps.push(sweep_batch(&mut parser, &remainder.path));
            progress.mark(Stage::Remainder);

            if let Some(inspection) = latest(Stage::Inspection, "xml", remainder.seq) {
                progress.mark(Stage::Inspection);
                if latest(Stage::Swamp, "host", inspection.seq).is_some() {
                    progress.mark(Stage::Swamp);
                }
            }
        }
        progress.set_intermediate(Store::merge(&sweeps));

        let done: Vec<u8> = Stage::ALL
            .into_iter()
            .filter(|stage| progress.is_completed(*stage))
            .map(Stage::number)
            .collect();
        info!("Completed stages: {done:?}");
        Ok(progress)
    }

    /// When the restart window was armed by an earlier run, if it was.
    pub fn restart_mark(&self) -> Option<SystemTime> {
        let raw = fs::read_to_string(self.path.join(RESTART_MARK)).ok()?;
        DateTime::parse_from_rfc3339(raw.trim()).ok().map(SystemTime::from)
    }

    /// Records the arming time, or clears it for `None`.
    pub fn save_restart_mark(&self, armed_at: Option<SystemTime>) -> Result<(), WorkspaceError> {
        let path = self.path.join(RESTART_MARK);
        let result = match armed_at {
            Some(at) => fs::write(&path, DateTime::<Utc>::from(at).to_rfc3339()),
            None => match fs::remove_file(&path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        result.map_err(|source| WorkspaceError::Io { path, source })
    }

    /// Re-parses every report into `store`.
    pub fn restore(&self, parser: &mut Parser, store: &mut Store) -> Result<RestoreSummary, WorkspaceError> {
        let reports = self.reports()?;
        let mut summary = RestoreSummary {
            reports: 0,
            last_seq: reports.iter().map(|report| report.seq).max().unwrap_or(0),
        };

        for report in &reports {
            let Some(outcome) = parser.parse(&report.path) else {
                continue;
            };
            match outcome.batch() {
                Ok(batch) => {
                    store.commit_batch(batch);
                    store.record_session(outcome.session);
                    summary.reports += 1;
                }
                Err(e) => warn!("Skipping {}: {e}", report.path.display()),
            }
        }

        info!(
            "Workspace {} restored: {} reports, {} hosts",
            self.path.display(),
            summary.reports,
            store.host_count()
        );
        Ok(summary)
    }
}

/// Hosts of the sweep that wrote `host_list`; an empty capture left no report.
fn sweep_batch(parser: &mut Parser, host_list: &Path) -> Batch {
    let xml = host_list.with_extension("xml");
    if !xml.exists() {
        return Batch::default();
    }
    parser
        .parse(&xml)
        .and_then(|outcome| outcome.batch().ok())
        .unwrap_or_default()
}

/// Writes one address per line, dropping repeats.
pub fn write_host_list<'a>(path: &Path, hosts: impl IntoIterator<Item = &'a str>) -> io::Result<usize> {
    let mut seen = HashSet::new();
    let mut body = String::new();
    for host in hosts {
        if seen.insert(host) {
            body.push_str(host);
            body.push('\n');
        }
    }
    fs::write(path, body)?;
    Ok(seen.len())
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
    use std::time::Duration;

    const MASSCAN_XML: &str = r#"<?xml version="1.0"?>
<nmaprun scanner="masscan" start="1700000000">
<host><address addr="10.0.0.5" addrtype="ipv4"/><ports><port protocol="tcp" portid="22"><state state="open"/></port></ports></host>
</nmaprun>"#;

    const NMAP_XML: &str = r#"<?xml version="1.0"?>
<nmaprun scanner="nmap" args="nmap 10.0.0.5 -oX x.xml -sV" start="1700000100">
<host><address addr="10.0.0.5" addrtype="ipv4"/><hostnames><hostname name="nas" type="PTR"/></hostnames>
<ports><port protocol="tcp" portid="22"><state state="open"/></port><port protocol="tcp" portid="80"><state state="open"/></port></ports></host>
</nmaprun>"#;

    #[test]
    fn default_name_is_a_timestamp() {
        let name = Workspace::default_name();
        assert_eq!(name.len(), 15);
        assert_eq!(name.as_bytes()[8], b'-');
    }

    #[test]
    fn create_open_and_save_config() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            Workspace::open(root.path(), "missing"),
            Err(WorkspaceError::NotFound(_))
        ));

        let workspace = Workspace::create(root.path(), Some("office")).unwrap();
        workspace.save_config(&Config::default()).unwrap();
        assert!(workspace.path().join(START_CONFIG).exists());
        assert_eq!(Workspace::open(root.path(), "office").unwrap(), workspace);
    }

    #[test]
    fn restore_reparses_reports_in_order() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path(), Some("lab")).unwrap();
        let dir = workspace.path();

        fs::write(dir.join("003-n-basic-[10-0-0-5]-basic.xml"), NMAP_XML).unwrap();
        fs::write(dir.join("002-m-stage_1-[10-0-0-0#24].xml"), MASSCAN_XML).unwrap();
        fs::write(dir.join("002-m-stage_1-[10-0-0-0#24].conf"), "masscan").unwrap();
        fs::write(dir.join("004-m-stage_2-[].xml"), "<broken").unwrap();
        fs::write(dir.join("notes.xml"), NMAP_XML).unwrap();

        let reports = workspace.reports().unwrap();
        let seqs: Vec<usize> = reports.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![2, 4, 3]);

        let mut parser = Parser::new();
        let mut store = Store::new();
        let summary = workspace.restore(&mut parser, &mut store).unwrap();

        assert_eq!(summary, RestoreSummary { reports: 2, last_seq: 4 });
        assert_eq!(store.sessions().len(), 2);
        let host = store.host("10.0.0.5").unwrap();
        assert_eq!(host.hostname.as_deref(), Some("nas"));
        assert_eq!(host.ports.len(), 2);
    }

    #[test]
    fn stage_progress_follows_the_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path(), Some("lab")).unwrap();
        let dir = workspace.path();
        assert_eq!(workspace.stage_progress().unwrap(), StageProgress::default());

        let stage_1 = dir.join("002-m-stage_1-[10-0-0-0#24].host");
        fs::write(dir.join("001-n-arp-[10-0-0-0#24]-arp.xml"), NMAP_XML).unwrap();
        fs::write(dir.join("002-m-stage_1-[10-0-0-0#24].conf"), "masscan").unwrap();
        fs::write(dir.join("002-m-stage_1-[10-0-0-0#24].xml"), MASSCAN_XML).unwrap();
        fs::write(&stage_1, "10.0.0.1\n10.0.0.5\n").unwrap();

        let progress = workspace.stage_progress().unwrap();
        assert!(progress.is_started());
        assert!(progress.is_completed(Stage::Discovery));
        assert!(!progress.is_completed(Stage::Remainder));
        assert_eq!(progress.hosts_file(), Some(stage_1.as_path()));
        assert_eq!(progress.intermediate().addresses(), vec!["10.0.0.5"]);

        // an empty stage-2 capture leaves a host list and no report
        fs::write(dir.join("003-m-stage_2-[].host"), "").unwrap();
        fs::write(dir.join("004-n-stage_3-[10-0-0-5]-basic.xml"), NMAP_XML).unwrap();
        let progress = workspace.stage_progress().unwrap();
        assert!(progress.is_completed(Stage::Remainder));
        assert!(progress.is_completed(Stage::Inspection));
        assert!(!progress.is_completed(Stage::Swamp));
        assert_eq!(progress.intermediate().addresses(), vec!["10.0.0.5"]);

        fs::write(dir.join("005-m-swamp-[10-0-0-0#24].host"), "").unwrap();
        assert!(workspace.stage_progress().unwrap().is_completed(Stage::Swamp));

        // a newer stage 1 makes the later stages stale
        fs::write(dir.join("006-m-stage_1-[10-0-0-0#24].host"), "10.0.0.5\n").unwrap();
        let progress = workspace.stage_progress().unwrap();
        assert!(progress.is_completed(Stage::Discovery));
        assert!(!progress.is_completed(Stage::Remainder));
        assert!(progress.intermediate().is_empty());
    }

    #[test]
    fn restart_mark_is_kept_between_runs() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(root.path(), None).unwrap();
        assert_eq!(workspace.restart_mark(), None);

        let armed_at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        workspace.save_restart_mark(Some(armed_at)).unwrap();
        assert_eq!(workspace.restart_mark(), Some(armed_at));

        workspace.save_restart_mark(None).unwrap();
        workspace.save_restart_mark(None).unwrap();
        assert_eq!(workspace.restart_mark(), None);
    }

    #[test]
    fn host_list_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("001-m-stage_1-[].host");
        let written = write_host_list(&path, ["10.0.0.1", "10.0.0.2", "10.0.0.1"]).unwrap();

        assert_eq!(written, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "10.0.0.1\n10.0.0.2\n");
    }
}
