//! # Result Store
//!
//! The cumulative host inventory of a session. Batches are validated before
//! they are merged (see [`Batch`]); a rejected batch leaves the inventory
//! untouched.
//!
//! Merging is keyed by address. Scalar fields of a known host take the
//! incoming value when one is present, and ports are appended unless an
//! identical observation already exists. Merging the same batch twice is
//! therefore a no-op.

use std::collections::HashMap;

use gummy_common::model::{Host, Protocol, ScanSession};
use tracing::{debug, warn};

mod schema;
mod views;

pub use schema::{Batch, SchemaError};
pub use views::{HostRow, PortRow};

/// What a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub new_hosts: usize,
    pub new_ports: usize,
}

impl MergeStats {
    pub fn is_empty(&self) -> bool {
        self.new_hosts == 0 && self.new_ports == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    hosts: Vec<Host>,
    index: HashMap<String, usize>,
    sessions: Vec<ScanSession>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `hosts` and merges them into the inventory.
    pub fn commit(&mut self, hosts: Vec<Host>) -> Result<MergeStats, SchemaError> {
        let batch = Batch::new(hosts).inspect_err(|e| warn!("Batch rejected: {e}"))?;
        Ok(self.commit_batch(batch))
    }

    pub fn commit_batch(&mut self, batch: Batch) -> MergeStats {
        let stats = merge_into(&mut self.hosts, &mut self.index, batch.into_hosts());
        if !stats.is_empty() {
            debug!(
                hosts = self.hosts.len(),
                new_hosts = stats.new_hosts,
                new_ports = stats.new_ports,
                "Inventory updated"
            );
        }
        stats
    }

    /// Merges independently validated batches without touching the inventory.
    pub fn merge<'a>(batches: impl IntoIterator<Item = &'a Batch>) -> Batch {
        let mut hosts = Vec::new();
        let mut index = HashMap::new();
        for batch in batches {
            merge_into(&mut hosts, &mut index, batch.hosts().to_vec());
        }
        // merging keeps addresses and port ids intact
        Batch::from_validated(hosts)
    }

    pub fn record_session(&mut self, session: ScanSession) {
        self.sessions.push(session);
    }

    pub fn sessions(&self) -> &[ScanSession] {
        &self.sessions
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, addr: &str) -> Option<&Host> {
        self.index.get(addr).map(|&i| &self.hosts[i])
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.hosts.iter().map(|host| host.addr.as_str()).collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Number of open (host, port) pairs.
    pub fn socket_count(&self) -> usize {
        self.hosts.iter().map(Host::open_count).sum()
    }

    /// Open port ids of `protocol` per host, in inventory order.
    pub fn open_ports(&self, protocol: Protocol) -> Vec<(&str, Vec<&str>)> {
        self.hosts
            .iter()
            .map(|host| (host.addr.as_str(), host.open_ports(protocol)))
            .collect()
    }
}

fn merge_into(hosts: &mut Vec<Host>, index: &mut HashMap<String, usize>, incoming: Vec<Host>) -> MergeStats {
    let mut stats = MergeStats::default();

    for host in incoming {
        match index.get(&host.addr) {
            Some(&i) => stats.new_ports += merge_host(&mut hosts[i], host),
            None => {
                stats.new_hosts += 1;
                index.insert(host.addr.clone(), hosts.len());
                // collapse duplicates within the incoming host itself
                let mut fresh = Host::new(host.addr.clone());
                stats.new_ports += merge_host(&mut fresh, host);
                hosts.push(fresh);
            }
        }
    }
    stats
}

/// Returns how many ports were appended.
fn merge_host(existing: &mut Host, incoming: Host) -> usize {
    let Host {
        mac,
        hostname,
        vendor,
        ports,
        ..
    } = incoming;

    if mac.is_some() {
        existing.mac = mac;
    }
    if hostname.is_some() {
        existing.hostname = hostname;
    }
    if vendor.is_some() {
        existing.vendor = vendor;
    }

    let mut added = 0;
    for port in ports {
        if existing.add_port(port) {
            added += 1;
        }
    }
    added
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
    use gummy_common::model::Port;

    fn ssh() -> Port {
        Port::open("22", Protocol::Tcp)
    }

    fn http() -> Port {
        Port::open("80", Protocol::Tcp)
    }

    #[test]
    fn merging_extends_ports_without_duplicates() {
        let mut store = Store::new();
        store.commit(vec![Host::new("10.0.0.5").with_port(ssh())]).unwrap();
        let stats = store
            .commit(vec![Host::new("10.0.0.5").with_port(ssh()).with_port(http())])
            .unwrap();

        assert_eq!(stats, MergeStats { new_hosts: 0, new_ports: 1 });
        let host = store.host("10.0.0.5").unwrap();
        assert_eq!(host.ports, vec![ssh(), http()]);
    }

    #[test]
    fn recommitting_a_batch_changes_nothing() {
        let batch = vec![
            Host::new("10.0.0.5").with_hostname("nas").with_port(ssh()),
            Host::new("10.0.0.6").with_port(Port::open("53", Protocol::Udp)),
        ];

        let mut store = Store::new();
        store.commit(batch.clone()).unwrap();
        let snapshot = store.hosts().to_vec();

        let stats = store.commit(batch).unwrap();
        assert!(stats.is_empty());
        assert_eq!(store.hosts(), snapshot.as_slice());
    }

    #[test]
    fn scalars_are_filled_and_updated() {
        let mut store = Store::new();
        store
            .commit(vec![Host::new("10.0.0.5").with_mac("00:11:22:33:44:55").with_hostname("old")])
            .unwrap();
        store
            .commit(vec![Host::new("10.0.0.5").with_hostname("new").with_vendor("Acme")])
            .unwrap();

        let host = store.host("10.0.0.5").unwrap();
        assert_eq!(host.mac.as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(host.hostname.as_deref(), Some("new"));
        assert_eq!(host.vendor.as_deref(), Some("Acme"));
    }

    #[test]
    fn states_are_distinct_observations() {
        let mut store = Store::new();
        store
            .commit(vec![Host::new("10.0.0.5").with_port(Port::new("22", Protocol::Tcp).with_state("filtered"))])
            .unwrap();
        store.commit(vec![Host::new("10.0.0.5").with_port(ssh())]).unwrap();

        assert_eq!(store.host("10.0.0.5").unwrap().ports.len(), 2);
        assert_eq!(store.socket_count(), 1);
    }

    #[test]
    fn invalid_batch_is_rejected_wholesale() {
        let mut store = Store::new();
        store.commit(vec![Host::new("10.0.0.5").with_port(ssh())]).unwrap();

        let result = store.commit(vec![
            Host::new("10.0.0.5").with_port(http()),
            Host::new("not-an-address"),
        ]);
        assert!(result.is_err());
        assert_eq!(store.host_count(), 1);
        assert_eq!(store.host("10.0.0.5").unwrap().ports, vec![ssh()]);
    }

    #[test]
    fn pure_merge_leaves_inventory_alone() {
        let store = Store::new();
        let first = Batch::new(vec![Host::new("10.0.0.5").with_port(ssh())]).unwrap();
        let second = Batch::new(vec![
            Host::new("10.0.0.5").with_port(http()),
            Host::new("10.0.0.7"),
        ])
        .unwrap();

        let merged = Store::merge([&first, &second]);
        assert_eq!(merged.addresses(), vec!["10.0.0.5", "10.0.0.7"]);
        assert_eq!(merged.hosts()[0].ports, vec![ssh(), http()]);
        assert_eq!(store.host_count(), 0);
    }

    #[test]
    fn pure_merge_keeps_every_validated_host() {
        let v4 = Batch::new(vec![Host::new("10.0.0.5").with_port(ssh())]).unwrap();
        let v6 = Batch::new(vec![
            Host::new("fe80::1").with_port(Port::open("546", Protocol::Udp)),
            Host::new("10.0.0.5").with_port(Port::new("22", Protocol::Tcp).with_state("filtered")),
        ])
        .unwrap();

        let merged = Store::merge([&v4, &Batch::default(), &v6]);
        assert_eq!(merged.addresses(), vec!["10.0.0.5", "fe80::1"]);
        assert_eq!(merged.hosts()[0].ports.len(), 2);
        assert_eq!(Batch::new(merged.hosts().to_vec()).unwrap(), merged);
    }

    #[test]
    fn merge_never_shrinks_inventory() {
        let mut store = Store::new();
        store
            .commit(vec![Host::new("10.0.0.5").with_port(ssh()).with_port(http())])
            .unwrap();
        store.commit(vec![Host::new("10.0.0.5")]).unwrap();
        store.commit(Vec::new()).unwrap();

        assert_eq!(store.host_count(), 1);
        assert_eq!(store.host("10.0.0.5").unwrap().ports.len(), 2);
    }

    #[test]
    fn open_ports_per_protocol() {
        let mut store = Store::new();
        store
            .commit(vec![
                Host::new("10.0.0.5")
                    .with_port(ssh())
                    .with_port(Port::open("161", Protocol::Udp)),
                Host::new("10.0.0.6"),
            ])
            .unwrap();

        assert_eq!(
            store.open_ports(Protocol::Tcp),
            vec![("10.0.0.5", vec!["22"]), ("10.0.0.6", vec![])]
        );
        assert_eq!(store.open_ports(Protocol::Udp)[0].1, vec!["161"]);
        assert_eq!(store.addresses(), vec!["10.0.0.5", "10.0.0.6"]);
    }
}
