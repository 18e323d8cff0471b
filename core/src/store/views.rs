use std::collections::BTreeMap;

use gummy_common::model::Protocol;

use super::Store;
use crate::catalog::PortCatalog;
use crate::ports::PortPrioritizer;

/// One line of the host summary.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRow {
    pub addr: String,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub open_count: usize,
    pub tcp: Vec<String>,
    pub udp: Vec<String>,
}

/// One line of the port summary.
#[derive(Debug, Clone, PartialEq)]
pub struct PortRow {
    pub port: u16,
    pub protocol: Protocol,
    pub rating: f64,
    pub descriptions: Vec<String>,
    pub hosts: Vec<String>,
}

impl PortRow {
    pub fn key(&self) -> String {
        format!("{}/{}", self.port, self.protocol)
    }

    pub fn count(&self) -> usize {
        self.hosts.len()
    }
}

impl Store {
    /// Hosts ordered by open port count, busiest first.
    pub fn host_summary(&self) -> Vec<HostRow> {
        let mut rows: Vec<HostRow> = self
            .hosts
            .iter()
            .map(|host| HostRow {
                addr: host.addr.clone(),
                hostname: host.hostname.clone(),
                vendor: host.vendor.clone(),
                open_count: host.open_count(),
                tcp: owned(host.open_ports(Protocol::Tcp)),
                udp: owned(host.open_ports(Protocol::Udp)),
            })
            .collect();

        rows.sort_by(|a, b| b.open_count.cmp(&a.open_count));
        rows
    }

    /// Every open port seen in the inventory, most widespread first.
    pub fn port_summary(&self, prioritizer: &PortPrioritizer, catalog: &PortCatalog) -> Vec<PortRow> {
        let mut seen: BTreeMap<(Protocol, u16), Vec<String>> = BTreeMap::new();

        for host in &self.hosts {
            for port in host.ports.iter().filter(|port| port.is_open()) {
                let Ok(number) = port.portid.parse::<u16>() else {
                    continue;
                };
                let hosts = seen.entry((port.protocol, number)).or_default();
                if !hosts.contains(&host.addr) {
                    hosts.push(host.addr.clone());
                }
            }
        }

        let mut rows: Vec<PortRow> = seen
            .into_iter()
            .map(|((protocol, port), hosts)| PortRow {
                port,
                protocol,
                rating: prioritizer.rating(port, protocol),
                descriptions: catalog.describe(port).into_iter().map(String::from).collect(),
                hosts,
            })
            .collect();

        rows.sort_by(|a, b| b.count().cmp(&a.count()));
        rows
    }
}

fn owned(ports: Vec<&str>) -> Vec<String> {
    ports.into_iter().map(String::from).collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
