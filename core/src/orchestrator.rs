//! # Staged Reconnaissance
//!
//! The [`Orchestrator`] sequences masscan and nmap runs so that a large
//! range is covered quickly while slow inspection is spent on hosts that
//! are known to be alive:
//!
//! 1. ARP sweep plus a fast sweep of the 1000 best-rated TCP/UDP ports.
//! 2. The remaining ports on the hosts found in stage 1.
//! 3. Per-host nmap inspection of every open port found so far.
//! 4. The remaining ports over the whole range, minus stage-1 hosts.
//!
//! Each stage requires the previous one. Progress survives the process: a
//! reopened workspace rebuilds it from its artifacts, see
//! [`Workspace::stage_progress`](crate::workspace::Workspace::stage_progress).
//! Restarting stage 1 over existing state is refused once, see
//! [`RestartGuard`].

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use gummy_common::config::Config;
use gummy_common::model::{InspectionMode, Protocol};
use gummy_common::network::target::TargetSpec;
use tracing::{info, warn};

use crate::parser::Parser;
use crate::ports::StagePlan;
use crate::scanner::{ScanReport, ScanRequest, ScanRunner};
use crate::store::{Batch, Store};
use crate::workspace::write_host_list;

mod guard;
mod registry;

pub use guard::{RestartGuard, RunCounter};
pub use registry::{PROFILES, Profile, ProfileFn, ProfileFuture, Session, find_profile};

/// Scan parameters shared by every run of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSettings {
    /// Resolved target list, `auto` already replaced by a network.
    pub target: Option<String>,
    pub exclude: Option<String>,
    /// Port list for the manual profiles.
    pub ports: Option<String>,
    pub top_ports: Option<u32>,
    pub rate: Option<u32>,
    pub scan_type: InspectionMode,
}

impl ScanSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let masscan = &config.masscan;
        let target = masscan.target.parse::<TargetSpec>().map_err(anyhow::Error::msg)?.resolve()?;
        let exclude = match masscan.target_exclude.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                Some(raw.parse::<TargetSpec>().map_err(anyhow::Error::msg)?.to_string())
            }
            _ => None,
        };

        Ok(Self {
            target: Some(target),
            exclude,
            ports: masscan.port.clone(),
            top_ports: masscan.top_ports,
            rate: masscan.rate,
            scan_type: config.nmap.scan_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Discovery = 1,
    Remainder = 2,
    Inspection = 3,
    Swamp = 4,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Discovery, Stage::Remainder, Stage::Inspection, Stage::Swamp];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.number() == number)
    }

    /// Label of the artifacts a stage writes.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Discovery => "stage_1",
            Stage::Remainder => "stage_2",
            Stage::Inspection => "stage_3",
            Stage::Swamp => "swamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed { hosts: usize },
    /// The previous stage is missing.
    Skipped(Stage),
    /// Stage 1 was refused by the restart guard.
    Refused,
    Aborted(String),
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed { .. })
    }
}

/// Working state of the staged workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageProgress {
    completed: [bool; 4],
    /// Stage-1 host list, include list of stage 2 and exclude list of stage 4.
    hosts_file: Option<PathBuf>,
    /// Hosts found by the sweeps of stages 1 and 2.
    intermediate: Batch,
    started: bool,
}

impl StageProgress {
    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed[usize::from(stage.number() - 1)]
    }

    pub fn hosts_file(&self) -> Option<&Path> {
        self.hosts_file.as_deref()
    }

    pub fn intermediate(&self) -> &Batch {
        &self.intermediate
    }

    /// Whether a staged scan holds state that a restart would discard.
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn mark(&mut self, stage: Stage) {
        self.completed[usize::from(stage.number() - 1)] = true;
        self.started = true;
    }

    pub(crate) fn set_hosts_file(&mut self, path: PathBuf) {
        self.hosts_file = Some(path);
    }

    pub(crate) fn set_intermediate(&mut self, batch: Batch) {
        self.intermediate = batch;
    }
}

pub struct Orchestrator {
    masscan: Box<dyn ScanRunner>,
    nmap: Box<dyn ScanRunner>,
    settings: ScanSettings,
    plan: StagePlan,
    parser: Parser,
    counter: RunCounter,
    guard: RestartGuard,
    state: StageProgress,
}

impl Orchestrator {
    pub fn new(
        masscan: Box<dyn ScanRunner>,
        nmap: Box<dyn ScanRunner>,
        settings: ScanSettings,
        plan: StagePlan,
        parser: Parser,
    ) -> Self {
        Self {
            masscan,
            nmap,
            settings,
            plan,
            parser,
            counter: RunCounter::new(),
            guard: RestartGuard::default(),
            state: StageProgress::default(),
        }
    }

    pub fn with_counter(mut self, counter: RunCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_restart_window(mut self, window: Duration) -> Self {
        self.guard = RestartGuard::new(window);
        self
    }

    pub fn with_restart_guard(mut self, guard: RestartGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Continues a staged scan of an earlier session.
    pub fn with_progress(mut self, progress: StageProgress) -> Self {
        self.state = progress;
        self
    }

    pub fn restart_guard(&self) -> &RestartGuard {
        &self.guard
    }

    pub fn progress(&self) -> &StageProgress {
        &self.state
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn last_seq(&self) -> usize {
        self.counter.last()
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.state.is_completed(stage)
    }

    /// Hosts found by the sweeps of stages 1 and 2.
    pub fn intermediate(&self) -> &Batch {
        self.state.intermediate()
    }

    pub fn stage_hosts_file(&self) -> Option<&Path> {
        self.state.hosts_file()
    }

    /// Runs `stages` in order, stopping at the first stage that does not
    /// complete.
    pub async fn run_stages(&mut self, stages: RangeInclusive<u8>, store: &mut Store) -> Vec<StageOutcome> {
        let mut outcomes = Vec::new();
        for stage in stages.filter_map(Stage::from_number) {
            let outcome = self.run_stage(stage, store).await;
            let completed = outcome.is_completed();
            outcomes.push(outcome);
            if !completed {
                break;
            }
        }
        if outcomes.last().is_some_and(StageOutcome::is_completed) {
            info!("{}", banner("END"));
        }
        outcomes
    }

    pub async fn run_stage(&mut self, stage: Stage, store: &mut Store) -> StageOutcome {
        match stage {
            Stage::Discovery => self.stage_one(store).await,
            Stage::Remainder => self.stage_two(store).await,
            Stage::Inspection => self.stage_three(store).await,
            Stage::Swamp => self.stage_four(store).await,
        }
    }

    async fn stage_one(&mut self, store: &mut Store) -> StageOutcome {
        if !self.guard.admit(self.state.is_started(), SystemTime::now()) {
            info!(
                "A staged scan has already been started; repeat the command within {} seconds to start over",
                self.guard.window().as_secs()
            );
            return StageOutcome::Refused;
        }
        self.state = StageProgress {
            started: true,
            ..StageProgress::default()
        };
        info!("{}", banner("STEP 1"));

        let arp = ScanRequest::new(self.counter.next(), "arp")
            .with_target(self.settings.target.clone().unwrap_or_default())
            .with_mode(InspectionMode::Arp);
        let arp_hosts: Vec<String> = match self.nmap.run(&arp, store).await {
            Ok(report) => report
                .outcome
                .map(|outcome| outcome.hosts.into_iter().map(|host| host.addr).collect())
                .unwrap_or_default(),
            Err(e) => return StageOutcome::Aborted(e.to_string()),
        };

        let sweep = self
            .sweep_request(Stage::Discovery.label())
            .with_target(self.settings.target.clone().unwrap_or_default())
            .with_tcp_ports(self.plan.tcp_sweep.clone())
            .with_udp_ports(self.plan.udp_sweep.clone());
        let report = match self.masscan.run(&sweep, store).await {
            Ok(report) => report,
            Err(e) => return StageOutcome::Aborted(e.to_string()),
        };
        let found = self.absorb(&report, store);

        if let Some(path) = &report.hosts_file {
            let hosts = arp_hosts.iter().map(String::as_str).chain(found.addresses());
            match write_host_list(path, hosts) {
                Ok(count) => info!("{count} hosts written to {}", path.display()),
                Err(e) => return StageOutcome::Aborted(format!("{}: {e}", path.display())),
            }
            self.state.set_hosts_file(path.clone());
        }

        let hosts = found.len();
        self.state.set_intermediate(found);
        self.state.mark(Stage::Discovery);
        StageOutcome::Completed { hosts }
    }

    async fn stage_two(&mut self, store: &mut Store) -> StageOutcome {
        if !self.state.is_completed(Stage::Discovery) || self.state.intermediate.is_empty() {
            warn!("Previous stage missing: stage 1 has no results");
            return StageOutcome::Skipped(Stage::Discovery);
        }
        let Some(hosts_file) = self.state.hosts_file.clone() else {
            warn!("Previous stage missing: stage 1 left no host list");
            return StageOutcome::Skipped(Stage::Discovery);
        };
        info!("{}", banner("STEP 2"));

        let request = self
            .sweep_request(Stage::Remainder.label())
            .with_include_file(&hosts_file)
            .with_tcp_ports(self.plan.tcp_remainder.clone())
            .with_udp_ports(self.plan.udp_remainder.clone());
        let report = match self.masscan.run(&request, store).await {
            Ok(report) => report,
            Err(e) => return StageOutcome::Aborted(e.to_string()),
        };
        let found = self.absorb(&report, store);
        self.write_found(&report, &found);

        let hosts = found.len();
        self.state.set_intermediate(Store::merge([&self.state.intermediate, &found]));
        self.state.mark(Stage::Remainder);
        StageOutcome::Completed { hosts }
    }

    async fn stage_three(&mut self, store: &mut Store) -> StageOutcome {
        if !self.state.is_completed(Stage::Remainder) {
            warn!("Previous stage missing: stage 2 has not completed");
            return StageOutcome::Skipped(Stage::Remainder);
        }
        info!("{}", banner("STEP 3"));

        let targets: Vec<(String, Vec<String>, Vec<String>)> = self
            .state
            .intermediate
            .hosts()
            .iter()
            .map(|host| {
                let owned = |protocol: Protocol| -> Vec<String> {
                    host.open_ports(protocol).into_iter().map(String::from).collect()
                };
                (host.addr.clone(), owned(Protocol::Tcp), owned(Protocol::Udp))
            })
            .collect();

        let mut inspected = 0;
        // a host without open ports is inspected on nmap's default ports
        for (addr, tcp, udp) in targets {
            info!("{addr} tcp:{} udp:{}", tcp.join(","), udp.join(","));
            let request = ScanRequest::new(self.counter.next(), Stage::Inspection.label())
                .with_target(addr.as_str())
                .with_tcp_ports(tcp.join(","))
                .with_udp_ports(udp.join(","))
                .with_mode(InspectionMode::Basic);
            match self.nmap.run(&request, store).await {
                Ok(_) => inspected += 1,
                Err(e) => warn!("Inspection of {addr} failed: {e}"),
            }
        }

        self.state.mark(Stage::Inspection);
        StageOutcome::Completed { hosts: inspected }
    }

    async fn stage_four(&mut self, store: &mut Store) -> StageOutcome {
        if !self.state.is_completed(Stage::Inspection) {
            warn!("Previous stage missing: stage 3 has not completed");
            return StageOutcome::Skipped(Stage::Inspection);
        }
        info!("{}", banner("STEP 4"));

        let mut request = self
            .sweep_request(Stage::Swamp.label())
            .with_target(self.settings.target.clone().unwrap_or_default())
            .with_tcp_ports(self.plan.tcp_remainder.clone())
            .with_udp_ports(self.plan.udp_remainder.clone());
        if let Some(known) = &self.state.hosts_file {
            request = request.with_exclude_file(known);
        }
        let report = match self.masscan.run(&request, store).await {
            Ok(report) => report,
            Err(e) => return StageOutcome::Aborted(e.to_string()),
        };
        let found = self.absorb(&report, store);
        self.write_found(&report, &found);
        for addr in found.addresses() {
            info!("New host: {addr}");
        }

        self.state.mark(Stage::Swamp);
        StageOutcome::Completed { hosts: found.len() }
    }

    /// Profile 001: a masscan run with the session settings.
    pub async fn manual_masscan(&mut self, store: &mut Store) -> StageOutcome {
        let request = self
            .sweep_request("basic")
            .with_target(self.settings.target.clone().unwrap_or_default())
            .with_tcp_ports(self.settings.ports.clone().unwrap_or_default())
            .with_top_ports(self.settings.top_ports);
        match self.masscan.run(&request, store).await {
            Ok(report) => {
                let found = self.absorb(&report, store);
                self.write_found(&report, &found);
                StageOutcome::Completed { hosts: found.len() }
            }
            Err(e) => StageOutcome::Aborted(e.to_string()),
        }
    }

    /// Profile 002: an nmap run with the session settings.
    pub async fn manual_nmap(&mut self, store: &mut Store) -> StageOutcome {
        let mode = self.settings.scan_type;
        let request = ScanRequest::new(self.counter.next(), mode.as_str())
            .with_target(self.settings.target.clone().unwrap_or_default())
            .with_tcp_ports(self.settings.ports.clone().unwrap_or_default())
            .with_mode(mode);
        self.nmap_pass(request, store).await
    }

    /// Profile 201.
    pub async fn arp_discovery(&mut self, store: &mut Store) -> StageOutcome {
        let request = ScanRequest::new(self.counter.next(), "arp")
            .with_target(self.settings.target.clone().unwrap_or_default())
            .with_mode(InspectionMode::Arp);
        self.nmap_pass(request, store).await
    }

    /// Profile 202.
    pub async fn dns_discovery(&mut self, store: &mut Store) -> StageOutcome {
        let request = ScanRequest::new(self.counter.next(), "dns")
            .with_target(self.settings.target.clone().unwrap_or_default())
            .with_mode(InspectionMode::Dns);
        self.nmap_pass(request, store).await
    }

    async fn nmap_pass(&mut self, request: ScanRequest, store: &mut Store) -> StageOutcome {
        match self.nmap.run(&request, store).await {
            Ok(report) => StageOutcome::Completed {
                hosts: report.outcome.map(|outcome| outcome.hosts.len()).unwrap_or(0),
            },
            Err(e) => StageOutcome::Aborted(e.to_string()),
        }
    }

    fn sweep_request(&mut self, label: &str) -> ScanRequest {
        ScanRequest::new(self.counter.next(), label)
            .with_exclude(self.settings.exclude.clone())
            .with_rate(self.settings.rate)
    }

    /// Parses a masscan report and commits what it holds.
    fn absorb(&mut self, report: &ScanReport, store: &mut Store) -> Batch {
        let Some(xml) = &report.xml else {
            return Batch::default();
        };
        let Some(outcome) = self.parser.parse(xml) else {
            return Batch::default();
        };
        match outcome.batch() {
            Ok(batch) => {
                let stats = store.commit_batch(batch.clone());
                store.record_session(outcome.session);
                info!(
                    "{} hosts in {}, {} new hosts, {} new ports",
                    batch.len(),
                    xml.display(),
                    stats.new_hosts,
                    stats.new_ports
                );
                batch
            }
            Err(e) => {
                warn!("Results of {} rejected: {e}", xml.display());
                Batch::default()
            }
        }
    }

    fn write_found(&self, report: &ScanReport, found: &Batch) {
        let Some(path) = &report.hosts_file else {
            return;
        };
        if let Err(e) = write_host_list(path, found.addresses()) {
            warn!("Could not write {}: {e}", path.display());
        }
    }
}

fn banner(title: &str) -> String {
    format!("{:#^40}", format!(" {title} "))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
