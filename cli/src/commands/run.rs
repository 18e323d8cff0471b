use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use colored::*;
use gummy_common::config::Config;
use gummy_core::orchestrator::{
    Orchestrator, RestartGuard, RunCounter, ScanSettings, Session, StageOutcome, StageProgress, find_profile,
};
use gummy_core::parser::Parser;
use gummy_core::ports::{PortPrioritizer, StagePlan, Weights};
use gummy_core::scanner::{MasscanRunner, NmapRunner};
use gummy_core::store::Store;
use gummy_core::vendors::{MacOuiRepo, VendorRepository};
use gummy_core::workspace::Workspace;
use is_root::is_root;
use tracing::{info, warn};

use crate::commands::{GlobalArgs, View, show};
use crate::terminal::{print, spinner};

pub async fn run(global: &GlobalArgs, config: &Config, key: &str) -> anyhow::Result<()> {
    let profile = find_profile(key).with_context(|| format!("unknown profile {key:?}, see `gummy profiles`"))?;
    if !is_root() {
        warn!("masscan and nmap need root privileges for raw packet scans");
    }

    let root = &config.main.results_root;
    let (workspace, resumed) = match global.workspace.as_deref() {
        Some(name) if root.join(name).is_dir() => (Workspace::open(root, name)?, true),
        name => (Workspace::create(root, name)?, false),
    };
    workspace.save_config(config)?;
    print::print_status(format!("Workspace: {}", workspace.path().display()));

    let vendors: Arc<dyn VendorRepository> = Arc::new(MacOuiRepo);
    let mut parser = Parser::new().with_vendors(vendors);
    let mut store = Store::new();
    let (counter, progress) = if resumed {
        let restored = workspace.restore(&mut parser, &mut store)?;
        (RunCounter::resume(restored.last_seq), workspace.stage_progress()?)
    } else {
        (RunCounter::new(), StageProgress::default())
    };
    let guard = RestartGuard::default().with_armed_at(workspace.restart_mark());

    let prioritizer = PortPrioritizer::load(&config.main.data_dir, Weights::from(&config.ratings));
    let plan = StagePlan::from_prioritizer(&prioritizer)?;
    let settings = ScanSettings::from_config(config).context("cannot resolve the scan target")?;
    info!("Target: {}", settings.target.as_deref().unwrap_or("-"));

    let masscan = MasscanRunner::locate(&config.main.masscan_path, workspace.path()).await?;
    let nmap = NmapRunner::locate(&config.main.nmap_path, workspace.path(), parser.clone()).await?;

    let orchestrator = Orchestrator::new(Box::new(masscan), Box::new(nmap), settings, plan, parser)
        .with_counter(counter)
        .with_progress(progress)
        .with_restart_guard(guard);
    let mut session = Session::new(orchestrator, store);

    print::header(&format!("{} {}", profile.id, profile.name));
    let started = Instant::now();
    let outcomes = spinner::with_spinner(profile.description, (profile.run)(&mut session)).await;

    workspace.save_restart_mark(session.orchestrator.restart_guard().armed_at())?;
    report(&outcomes);
    summary(&session.store, started.elapsed(), config);
    Ok(())
}

fn report(outcomes: &[StageOutcome]) {
    for outcome in outcomes {
        match outcome {
            StageOutcome::Completed { hosts } => info!("Completed, {hosts} hosts"),
            StageOutcome::Skipped(stage) => warn!("Skipped: previous stage {} missing", stage.number()),
            StageOutcome::Refused => warn!("Refused: a staged scan already holds results"),
            StageOutcome::Aborted(reason) => warn!("Aborted: {reason}"),
        }
    }
}

fn summary(store: &Store, elapsed: Duration, config: &Config) {
    show::render(View::Hosts, store, config);

    let hosts = format!("{} hosts", store.host_count()).bold().green();
    let sockets = format!("{} open sockets", store.socket_count()).bold().green();
    let time = format!("{:.2}s", elapsed.as_secs_f64()).bold().yellow();

    print::fat_separator();
    print::centerln(&format!("Scan complete: {hosts} and {sockets} in {time}"));
}
