//! The **abstraction** over the two external scanners.
//!
//! Orchestration code depends on [`ScanRunner`] only. A runner turns a
//! [`ScanRequest`] into an argument vector, launches the tool, consumes its
//! output line by line while it runs and leaves its artifacts in the session
//! workspace:
//!
//! * [`MasscanRunner`]: fast sweeps. Discovered sockets are forwarded to the
//!   store as they are printed; the binary capture is converted to XML once
//!   the process exits.
//! * [`NmapRunner`]: deep inspection. Output is relayed to the log live and
//!   the XML report is parsed and committed after completion.

use std::path::PathBuf;

use async_trait::async_trait;
use gummy_common::model::ToolKind;
use thiserror::Error;

use crate::parser::ParseOutcome;
use crate::store::Store;

mod masscan;
mod naming;
mod nmap;
mod request;
mod stream;
mod tool;

pub use masscan::MasscanRunner;
pub use naming::{ArtifactName, sanitize_target};
pub use nmap::NmapRunner;
pub use request::ScanRequest;
pub use stream::{Discovery, Progress, StreamEvent};
pub use tool::{Tool, ToolError};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("{tool} run failed: {source}")]
    Io {
        tool: ToolKind,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub(crate) fn io(tool: ToolKind) -> impl FnOnce(std::io::Error) -> Self {
        move |source| ScanError::Io { tool, source }
    }
}

/// Artifacts and results of one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub seq: usize,
    /// The exchange artifact; absent when there was nothing to convert.
    pub xml: Option<PathBuf>,
    /// Where the caller should write the list of discovered hosts.
    pub hosts_file: Option<PathBuf>,
    /// Set by runners that parse their own report.
    pub outcome: Option<ParseOutcome>,
    pub exit_code: Option<i32>,
}

#[async_trait]
pub trait ScanRunner: Send {
    fn kind(&self) -> ToolKind;

    /// Runs one scan to completion.
    ///
    /// A request lacking a required parameter fails before any process is
    /// started.
    async fn run(&mut self, request: &ScanRequest, store: &mut Store) -> Result<ScanReport, ScanError>;
}
