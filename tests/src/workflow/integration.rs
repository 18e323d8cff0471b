#![cfg(test)]
use std::fs;

use gummy_common::model::{Port, Protocol};
use gummy_core::orchestrator::{Orchestrator, RestartGuard, RunCounter, ScanSettings, Stage, StageOutcome};
use gummy_core::parser::Parser;
use gummy_core::ports::{PortPrioritizer, RatingSources, StagePlan, Weights};
use gummy_core::scanner::{MasscanRunner, NmapRunner, ScanRequest, ScanRunner};
use gummy_core::store::Store;
use gummy_core::workspace::Workspace;

use crate::utils::FakeScanners;

fn plan() -> StagePlan {
    let sources = RatingSources::default()
        .with_manual(22, Protocol::Tcp, 1.0)
        .with_manual(161, Protocol::Udp, 1.0);
    StagePlan::from_prioritizer(&PortPrioritizer::new(sources, Weights::default())).unwrap()
}

fn settings() -> ScanSettings {
    ScanSettings {
        target: Some(String::from("10.0.0.0/24")),
        rate: Some(1000),
        ..ScanSettings::default()
    }
}

async fn orchestrator(scanners: &FakeScanners, workspace: &Workspace) -> Orchestrator {
    orchestrator_with(scanners, workspace, Parser::new()).await
}

async fn orchestrator_with(scanners: &FakeScanners, workspace: &Workspace, parser: Parser) -> Orchestrator {
    let masscan = MasscanRunner::locate(&scanners.masscan, workspace.path())
        .await
        .expect("fake masscan is usable");
    let nmap = NmapRunner::locate(&scanners.nmap, workspace.path(), parser.clone())
        .await
        .expect("fake nmap is usable");
    Orchestrator::new(Box::new(masscan), Box::new(nmap), settings(), plan(), parser)
}

/// Runs all four stages against the fake scanners and checks the inventory,
/// the artifacts left in the workspace and the arguments the tools received.
#[tokio::test]
async fn staged_workflow_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let scanners = FakeScanners::install(dir.path());
    let workspace = Workspace::create(&dir.path().join("scans"), Some("lab")).unwrap();
    let mut orchestrator = orchestrator(&scanners, &workspace).await;
    let mut store = Store::new();

    let outcomes = orchestrator.run_stages(1..=4, &mut store).await;
    assert!(
        outcomes.iter().all(StageOutcome::is_completed),
        "Unexpected outcomes: {outcomes:?}"
    );
    assert_eq!(outcomes.len(), 4);
    assert_eq!(orchestrator.last_seq(), 5);

    let gateway = store.host("10.0.0.1").expect("ARP host is stored");
    assert_eq!(gateway.hostname.as_deref(), Some("gateway"));
    assert_eq!(gateway.vendor.as_deref(), Some("Acme"));
    assert!(store.host("10.0.0.9").is_none(), "ARP host without a name must be dropped");

    let nas = store.host("10.0.0.5").expect("swept host is stored");
    assert_eq!(nas.hostname.as_deref(), Some("nas"));
    assert_eq!(nas.open_ports(Protocol::Tcp), vec!["22", "8080"]);
    assert!(store.host("10.0.0.77").is_some());

    let ws = workspace.path();
    let stage_hosts = ws.join("002-m-stage_1-[10-0-0-0#24].host");
    assert_eq!(fs::read_to_string(&stage_hosts).unwrap(), "10.0.0.1\n10.0.0.5\n");
    assert!(ws.join("001-n-arp-[10-0-0-0#24]-arp.xml").exists());
    assert!(ws.join("002-m-stage_1-[10-0-0-0#24].conf").exists());
    assert!(ws.join("003-m-stage_2-[].xml").exists());
    assert!(ws.join("004-n-stage_3-[10-0-0-5]-basic.xml").exists());
    assert!(ws.join("005-m-swamp-[10-0-0-0#24].xml").exists());

    let masscan_calls = scanners.calls("masscan");
    assert_eq!(masscan_calls.len(), 3);
    let stage_hosts = stage_hosts.to_string_lossy().into_owned();
    assert!(masscan_calls[1].contains(&format!("--includefile {stage_hosts}")));
    assert!(masscan_calls[2].contains(&format!("--excludefile {stage_hosts}")));
    assert!(masscan_calls.iter().all(|call| call.contains("--rate 1000")));

    let nmap_calls = scanners.calls("nmap");
    assert_eq!(nmap_calls.len(), 2);
    assert!(nmap_calls[0].contains("-PR -Pn -sn"));
    assert!(nmap_calls[1].starts_with("10.0.0.5 "));
    assert!(nmap_calls[1].contains("-p T:22,8080"));
}

/// A second `gummy run` on the same workspace picks up after stage 1.
#[tokio::test]
async fn reopened_workspace_continues_the_staged_scan() {
    let dir = tempfile::tempdir().unwrap();
    let scanners = FakeScanners::install(dir.path());
    let root = dir.path().join("scans");
    let workspace = Workspace::create(&root, Some("lab")).unwrap();

    let mut first = orchestrator(&scanners, &workspace).await;
    let mut store = Store::new();
    assert!(first.run_stage(Stage::Discovery, &mut store).await.is_completed());
    drop(first);

    let reopened = Workspace::open(&root, "lab").unwrap();
    let mut parser = Parser::new();
    let mut restored = Store::new();
    let summary = reopened.restore(&mut parser, &mut restored).unwrap();
    let progress = reopened.stage_progress().unwrap();

    assert_eq!(summary.last_seq, 2);
    assert_eq!(summary.reports, 2);
    assert_eq!(restored.addresses(), vec!["10.0.0.5", "10.0.0.1"]);
    assert!(progress.is_completed(Stage::Discovery));
    assert!(!progress.is_completed(Stage::Remainder));

    let mut resumed = orchestrator_with(&scanners, &reopened, parser)
        .await
        .with_counter(RunCounter::resume(summary.last_seq))
        .with_progress(progress);
    assert_eq!(
        resumed.run_stage(Stage::Remainder, &mut restored).await,
        StageOutcome::Completed { hosts: 1 }
    );

    let ws = reopened.path();
    let stage_hosts = ws.join("002-m-stage_1-[10-0-0-0#24].host");
    assert!(ws.join("003-m-stage_2-[].xml").exists());
    assert!(scanners.calls("masscan")[1].contains(&format!("--includefile {}", stage_hosts.display())));
    assert_eq!(restored.host("10.0.0.5").unwrap().open_ports(Protocol::Tcp), vec!["22", "8080"]);

    // restarting stage 1 needs a confirming run inside the window
    assert_eq!(resumed.run_stage(Stage::Discovery, &mut restored).await, StageOutcome::Refused);
    reopened.save_restart_mark(resumed.restart_guard().armed_at()).unwrap();
    drop(resumed);

    let progress = reopened.stage_progress().unwrap();
    assert!(progress.is_completed(Stage::Remainder));
    let guard = RestartGuard::default().with_armed_at(reopened.restart_mark());
    let mut confirmed = orchestrator(&scanners, &reopened)
        .await
        .with_counter(RunCounter::resume(3))
        .with_progress(progress)
        .with_restart_guard(guard);
    assert!(confirmed.run_stage(Stage::Discovery, &mut restored).await.is_completed());
    assert!(ws.join("005-m-stage_1-[10-0-0-0#24].host").exists());
    assert!(!confirmed.is_completed(Stage::Remainder));
}

#[tokio::test]
async fn masscan_streams_discoveries_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let scanners = FakeScanners::install(dir.path());
    let workspace = Workspace::create(&dir.path().join("scans"), None).unwrap();
    let mut masscan = MasscanRunner::locate(&scanners.masscan, workspace.path()).await.unwrap();
    let mut store = Store::new();

    let request = ScanRequest::new(1, "stage_1")
        .with_target("10.0.0.0/24")
        .with_tcp_ports("22")
        .with_rate(Some(100));
    let report = masscan.run(&request, &mut store).await.unwrap();

    assert_eq!(report.exit_code, Some(0));
    assert!(report.xml.as_ref().is_some_and(|xml| xml.exists()));
    assert_eq!(
        store.host("10.0.0.5").unwrap().ports,
        vec![Port::open("22", Protocol::Tcp)]
    );
    let conf = fs::read_to_string(workspace.path().join("001-m-stage_1-[10-0-0-0#24].conf")).unwrap();
    assert!(conf.contains("--range 10.0.0.0/24 --ports 22"));
}

#[tokio::test]
async fn empty_capture_leaves_no_report() {
    let dir = tempfile::tempdir().unwrap();
    let scanners = FakeScanners::install(dir.path());
    let workspace = Workspace::create(&dir.path().join("scans"), None).unwrap();
    let mut masscan = MasscanRunner::locate(&scanners.masscan, workspace.path()).await.unwrap();
    let mut store = Store::new();

    let request = ScanRequest::new(1, "basic")
        .with_target("10.9.0.0/24")
        .with_top_ports(Some(10));
    let report = masscan.run(&request, &mut store).await.unwrap();

    assert_eq!(report.xml, None);
    assert_eq!(store.host_count(), 0);
}
