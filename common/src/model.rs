//! # Inventory Model
//!
//! The records both scanners are reduced to. A [`Host`] is keyed by its
//! address and carries an unordered collection of [`Port`] observations.
//!
//! The JSON form of a `Vec<Host>` is the exchange value passed between the
//! parser, the store and the orchestrator stages. Unknown fields are rejected
//! on deserialization.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport protocol of an observed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Tcp, Protocol::Udp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

/// A single port observation.
///
/// Two ports are the same observation only if every field matches, so
/// `22/tcp open` and `22/tcp filtered` are kept side by side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Port {
    pub portid: String,
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Port {
    pub fn new(portid: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            portid: portid.into(),
            protocol,
            state: None,
        }
    }

    pub fn open(portid: impl Into<String>, protocol: Protocol) -> Self {
        Self::new(portid, protocol).with_state("open")
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.state.as_deref() == Some("open")
    }

    /// `"<portid>/<protocol>"`, the key used by the rating catalogs.
    pub fn key(&self) -> String {
        format!("{}/{}", self.portid, self.protocol)
    }
}

/// A host as reported by one of the scanners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,
}

impl Host {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.add_port(port);
        self
    }

    /// Appends `port` unless an identical observation is already present.
    ///
    /// Returns `true` if the port was added.
    pub fn add_port(&mut self, port: Port) -> bool {
        if self.ports.contains(&port) {
            return false;
        }
        self.ports.push(port);
        true
    }

    /// Port numbers in open state for `protocol`, in insertion order.
    pub fn open_ports(&self, protocol: Protocol) -> Vec<&str> {
        self.ports
            .iter()
            .filter(|port| port.protocol == protocol && port.is_open())
            .map(|port| port.portid.as_str())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.ports.iter().filter(|port| port.is_open()).count()
    }
}

/// The two external scanners `gummy` knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Masscan,
    Nmap,
}

impl ToolKind {
    /// Short tag used in artifact names (`001-m-...`, `002-n-...`).
    pub fn tag(&self) -> &'static str {
        match self {
            ToolKind::Masscan => "m",
            ToolKind::Nmap => "n",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Masscan => "masscan",
            ToolKind::Nmap => "nmap",
        }
    }

    /// Prefix of the line printed by `<tool> -V`.
    pub fn version_banner(&self) -> &'static str {
        match self {
            ToolKind::Masscan => "Masscan version",
            ToolKind::Nmap => "Nmap version",
        }
    }

    /// Resolves the `scanner` attribute of an exchange artifact.
    pub fn from_scanner_attr(attr: &str) -> Option<Self> {
        match attr {
            "masscan" => Some(ToolKind::Masscan),
            "nmap" => Some(ToolKind::Nmap),
            _ => None,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a deep-inspection run is asked to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectionMode {
    /// Service and OS detection on explicit ports.
    #[default]
    Basic,
    /// ARP ping sweep, no port scan.
    Arp,
    /// Reverse-DNS list scan, no packets to the targets.
    Dns,
}

impl InspectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionMode::Basic => "basic",
            InspectionMode::Arp => "arp",
            InspectionMode::Dns => "dns",
        }
    }
}

impl fmt::Display for InspectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InspectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(InspectionMode::Basic),
            "arp" => Ok(InspectionMode::Arp),
            "dns" => Ok(InspectionMode::Dns),
            other => Err(format!("unknown scan type: {other}")),
        }
    }
}

/// Metadata of one parsed exchange artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSession {
    /// Number of artifacts parsed before this one during the same run.
    pub seq: usize,
    pub file: PathBuf,
    pub tool: ToolKind,
    pub started: Option<DateTime<Utc>>,
    /// Command line recorded by the tool (nmap only).
    pub args: Option<String>,
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
