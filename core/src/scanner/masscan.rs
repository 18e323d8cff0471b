use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use gummy_common::model::{Host, Port, ToolKind};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::naming::ArtifactName;
use super::stream::{self, DiscoveryLedger, MergedOutput, ProgressThrottle, StreamEvent};
use super::tool::{Tool, ToolError};
use super::{ScanError, ScanReport, ScanRequest, ScanRunner};
use crate::store::Store;

/// Paths written by one masscan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasscanArtifacts {
    /// Binary capture (`-oB`).
    pub raw: PathBuf,
    pub xml: PathBuf,
    /// The recorded command line.
    pub conf: PathBuf,
    pub hosts: PathBuf,
}

impl MasscanArtifacts {
    pub fn new(workspace: &Path, request: &ScanRequest) -> Self {
        let name = ArtifactName::new(
            request.seq,
            ToolKind::Masscan,
            &request.label,
            request.target.as_deref(),
        );
        Self {
            raw: name.path(workspace, ".masscan"),
            xml: name.path(workspace, ".xml"),
            conf: name.path(workspace, ".conf"),
            hosts: name.path(workspace, ".host"),
        }
    }
}

pub struct MasscanRunner {
    tool: Tool,
    workspace: PathBuf,
}

impl MasscanRunner {
    pub async fn locate(path: &Path, workspace: &Path) -> Result<Self, ToolError> {
        let tool = Tool::locate(ToolKind::Masscan, path).await?;
        Ok(Self::new(tool, workspace))
    }

    pub fn new(tool: Tool, workspace: &Path) -> Self {
        Self {
            tool,
            workspace: workspace.to_path_buf(),
        }
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    /// Argument vector for `request`, without the program itself.
    pub fn build_args(&self, request: &ScanRequest, artifacts: &MasscanArtifacts) -> Result<Vec<String>, ScanError> {
        let mut args = Vec::new();

        if let Some(target) = &request.target {
            args.extend(["--range".to_string(), target.clone()]);
        } else if let Some(file) = &request.include_file {
            args.extend(["--includefile".to_string(), path_arg(file)]);
        } else {
            return Err(ScanError::MissingParameter("target"));
        }

        if let Some(exclude) = &request.exclude {
            args.extend(["--exclude".to_string(), exclude.clone()]);
        }
        if let Some(file) = &request.exclude_file {
            args.extend(["--excludefile".to_string(), path_arg(file)]);
        }

        if request.has_ports() {
            if let Some(tcp) = &request.tcp_ports {
                args.extend(["--ports".to_string(), tcp.clone()]);
            }
            if let Some(udp) = &request.udp_ports {
                args.extend(["--udp-ports".to_string(), udp.clone()]);
            }
        } else if let Some(top) = request.top_ports {
            args.extend(["--top-ports".to_string(), top.to_string()]);
        } else {
            return Err(ScanError::MissingParameter("port or top-ports or udp-ports"));
        }

        args.extend(["-oB".to_string(), path_arg(&artifacts.raw)]);

        match request.rate {
            Some(rate) => args.extend(["--rate".to_string(), rate.to_string()]),
            None => warn!("Argument \"rate\" not set, the masscan default is used"),
        }

        args.extend(["--wait", "1", "--interactive"].map(String::from));
        Ok(args)
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = path_arg(&self.tool.path);
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    async fn capture(&self, args: &[String], store: &mut Store) -> Result<Option<i32>, ScanError> {
        let mut child = Command::new(&self.tool.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ScanError::io(ToolKind::Masscan))?;

        let mut output = MergedOutput::attach(&mut child, stream::MASSCAN_DELIMITERS);
        let mut watcher = OutputWatcher::default();

        while let Some(line) = output.next_line().await {
            let line = line.map_err(ScanError::io(ToolKind::Masscan))?;
            watcher.handle(&line, store);
        }

        let status = child.wait().await.map_err(ScanError::io(ToolKind::Masscan))?;
        if !status.success() {
            warn!("masscan exited with {status}");
        }
        debug!(sockets = watcher.ledger.len(), "Capture finished");
        Ok(status.code())
    }

    /// Converts the binary capture to XML; an empty capture is left alone.
    async fn convert(&self, artifacts: &MasscanArtifacts) -> Result<Option<PathBuf>, ScanError> {
        match fs::metadata(&artifacts.raw) {
            Ok(meta) if meta.len() == 0 => {
                warn!("The file {} is empty", artifacts.raw.display());
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("The capture {} cannot be read: {e}", artifacts.raw.display());
                return Ok(None);
            }
        }

        debug!("Convert {} to {}", artifacts.raw.display(), artifacts.xml.display());
        let output = Command::new(&self.tool.path)
            .arg("--readscan")
            .arg(&artifacts.raw)
            .arg("-oX")
            .arg(&artifacts.xml)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ScanError::io(ToolKind::Masscan))?;

        for line in String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .filter(|line| !line.trim().is_empty())
        {
            debug!("{}", line.trim());
        }
        if !output.status.success() {
            warn!("masscan --readscan exited with {}", output.status);
        }
        Ok(Some(artifacts.xml.clone()))
    }
}

#[async_trait]
impl ScanRunner for MasscanRunner {
    fn kind(&self) -> ToolKind {
        ToolKind::Masscan
    }

    async fn run(&mut self, request: &ScanRequest, store: &mut Store) -> Result<ScanReport, ScanError> {
        let artifacts = MasscanArtifacts::new(&self.workspace, request);
        let args = self
            .build_args(request, &artifacts)
            .inspect_err(|e| warn!("{e}"))?;

        let command_line = self.command_line(&args);
        debug!("Write the command to a file {}", artifacts.conf.display());
        fs::write(&artifacts.conf, &command_line).map_err(ScanError::io(ToolKind::Masscan))?;

        info!("Scan start");
        debug!("run: {command_line}");
        let exit_code = self.capture(&args, store).await?;
        info!("Scan complete");

        let xml = self.convert(&artifacts).await?;
        Ok(ScanReport {
            seq: request.seq,
            xml,
            hosts_file: Some(artifacts.hosts),
            outcome: None,
            exit_code,
        })
    }
}

/// Reacts to masscan's live output.
#[derive(Debug, Default)]
struct OutputWatcher {
    last_line: Option<String>,
    throttle: ProgressThrottle,
    ledger: DiscoveryLedger,
}

impl OutputWatcher {
    fn handle(&mut self, line: &str, store: &mut Store) {
        let line = line.trim_end();
        if line.is_empty() || self.last_line.as_deref() == Some(line) {
            return;
        }
        self.last_line = Some(line.to_string());

        match stream::classify_masscan(line) {
            StreamEvent::Progress(progress) => {
                if self.throttle.admit(&progress) {
                    info!(
                        "[{}%] Time: {} Found: {}",
                        progress.percent,
                        progress.remaining,
                        progress.found + self.ledger.udp_count()
                    );
                }
            }
            StreamEvent::Discovery(discovery) => {
                if !self.ledger.record(&discovery) {
                    return;
                }
                let host = Host::new(discovery.addr.as_str())
                    .with_port(Port::open(discovery.portid.as_str(), discovery.protocol));
                if let Err(e) = store.commit(vec![host]) {
                    warn!("Discovery of {} not stored: {e}", discovery.addr);
                }
            }
            StreamEvent::RawLine(raw) => debug!("{raw}"),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
