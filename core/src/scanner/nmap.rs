use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use gummy_common::model::{InspectionMode, ToolKind};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::naming::ArtifactName;
use super::stream::{self, MergedOutput};
use super::tool::{Tool, ToolError};
use super::{ScanError, ScanReport, ScanRequest, ScanRunner};
use crate::parser::Parser;
use crate::store::Store;

const BASIC_ARGS: [&str; 8] = [
    "-sV",
    "-Pn",
    "--disable-arp-ping",
    "-T4",
    "-O",
    "--version-light",
    "--stats-every",
    "1s",
];
const ARP_ARGS: [&str; 3] = ["-PR", "-Pn", "-sn"];
const DNS_ARGS: [&str; 1] = ["-sL"];

pub struct NmapRunner {
    tool: Tool,
    workspace: PathBuf,
    parser: Parser,
}

impl NmapRunner {
    pub async fn locate(path: &Path, workspace: &Path, parser: Parser) -> Result<Self, ToolError> {
        let tool = Tool::locate(ToolKind::Nmap, path).await?;
        Ok(Self::new(tool, workspace, parser))
    }

    pub fn new(tool: Tool, workspace: &Path, parser: Parser) -> Self {
        Self {
            tool,
            workspace: workspace.to_path_buf(),
            parser,
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// `{seq}-n-{label}-[{target}]-{mode}.xml`
    pub fn report_path(&self, request: &ScanRequest) -> PathBuf {
        ArtifactName::new(request.seq, ToolKind::Nmap, &request.label, request.target.as_deref())
            .path(&self.workspace, &format!("-{}.xml", request.mode))
    }

    pub fn build_args(&self, request: &ScanRequest, xml: &Path) -> Result<Vec<String>, ScanError> {
        let Some(target) = &request.target else {
            return Err(ScanError::MissingParameter("target"));
        };
        let mut args = vec![target.clone(), "-oX".to_string(), xml.to_string_lossy().into_owned()];

        match request.mode {
            InspectionMode::Basic => {
                let mut ports = Vec::new();
                if let Some(tcp) = &request.tcp_ports {
                    args.push("-sS".to_string());
                    ports.push(format!("T:{tcp}"));
                }
                if let Some(udp) = &request.udp_ports {
                    args.push("-sU".to_string());
                    ports.push(format!("U:{udp}"));
                }
                if !ports.is_empty() {
                    args.extend(["-p".to_string(), ports.join(",")]);
                }
                args.extend(BASIC_ARGS.map(String::from));
            }
            InspectionMode::Arp => args.extend(ARP_ARGS.map(String::from)),
            InspectionMode::Dns => args.extend(DNS_ARGS.map(String::from)),
        }
        Ok(args)
    }
}

#[async_trait]
impl ScanRunner for NmapRunner {
    fn kind(&self) -> ToolKind {
        ToolKind::Nmap
    }

    async fn run(&mut self, request: &ScanRequest, store: &mut Store) -> Result<ScanReport, ScanError> {
        let xml = self.report_path(request);
        let args = self.build_args(request, &xml).inspect_err(|e| warn!("{e}"))?;

        info!("Scan start");
        debug!("run: {} {}", self.tool.path.display(), args.join(" "));

        let mut child = Command::new(&self.tool.path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ScanError::io(ToolKind::Nmap))?;

        let mut output = MergedOutput::attach(&mut child, stream::NMAP_DELIMITERS);
        while let Some(line) = output.next_line().await {
            let line = line.map_err(ScanError::io(ToolKind::Nmap))?;
            if stream::is_nmap_boilerplate(&line) {
                debug!("{line}");
            } else {
                info!("{line}");
            }
        }

        let status = child.wait().await.map_err(ScanError::io(ToolKind::Nmap))?;
        if !status.success() {
            warn!("nmap exited with {status}");
        }
        info!("Scan complete");

        let outcome = self.parser.parse(&xml);
        if let Some(outcome) = &outcome {
            match outcome.batch() {
                Ok(batch) => {
                    store.commit_batch(batch);
                    store.record_session(outcome.session.clone());
                }
                Err(e) => warn!("Results of {} rejected: {e}", xml.display()),
            }
        }

        Ok(ScanReport {
            seq: request.seq,
            xml: Some(xml),
            hosts_file: None,
            outcome,
            exit_code: status.code(),
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
