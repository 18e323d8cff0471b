//! # Result Parser
//!
//! Reads the XML artifact a finished run left behind and reduces it to
//! [`Host`] records. Both scanners emit nmap-style XML; the `scanner`
//! attribute of the root element decides which reading rules apply.
//!
//! Failures never propagate: a missing or malformed file, or an artifact from
//! an unknown scanner, is reported and yields no outcome.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{fmt, fs};

use chrono::{DateTime, Utc};
use gummy_common::model::{Host, Port, Protocol, ScanSession, ToolKind};
use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, warn};

use crate::store::{Batch, SchemaError};
use crate::vendors::VendorRepository;

/// Flags nmap records for a list scan, which carries no port data.
const LIST_SCAN_FLAG: &str = "-sL";
/// Flags of an ARP ping sweep.
const ARP_SWEEP_FLAGS: [&str; 3] = ["-PR", "-Pn", "-sn"];

/// Hosts read from one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub session: ScanSession,
    pub hosts: Vec<Host>,
}

impl ParseOutcome {
    pub fn addresses(&self) -> Vec<&str> {
        self.hosts.iter().map(|host| host.addr.as_str()).collect()
    }

    pub fn batch(&self) -> Result<Batch, SchemaError> {
        Batch::new(self.hosts.clone())
    }
}

/// Clones share the session sequence, so every artifact parsed within one
/// run gets a distinct number.
#[derive(Default, Clone)]
pub struct Parser {
    history: Vec<ScanSession>,
    parsed: Arc<AtomicUsize>,
    vendors: Option<Arc<dyn VendorRepository>>,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("history", &self.history)
            .field("parsed", &self.parsed.load(Ordering::Relaxed))
            .field("vendors", &self.vendors.is_some())
            .finish()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vendor lookup for MAC addresses nmap did not annotate.
    pub fn with_vendors(mut self, vendors: Arc<dyn VendorRepository>) -> Self {
        self.vendors = Some(vendors);
        self
    }

    /// Every artifact parsed so far, oldest first.
    pub fn history(&self) -> &[ScanSession] {
        &self.history
    }

    pub fn parse(&mut self, file: &Path) -> Option<ParseOutcome> {
        if !file.exists() {
            warn!("The file {} was not found", file.display());
            return None;
        }
        let text = match fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read {}: {e}", file.display());
                return None;
            }
        };
        self.parse_document(file, &text)
    }

    fn parse_document(&mut self, file: &Path, text: &str) -> Option<ParseOutcome> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = match Document::parse_with_options(text, options) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Error parsing the file {}: {e}", file.display());
                return None;
            }
        };

        let root = doc.root_element();
        let scanner = root.attribute("scanner").unwrap_or_default();
        let Some(tool) = ToolKind::from_scanner_attr(scanner) else {
            warn!("Unexpected scanner {scanner:?} in {}, file skipped", file.display());
            return None;
        };

        let session = ScanSession {
            seq: self.parsed.fetch_add(1, Ordering::Relaxed),
            file: file.to_path_buf(),
            tool,
            started: root.attribute("start").and_then(parse_timestamp),
            args: match tool {
                ToolKind::Nmap => root.attribute("args").map(String::from),
                ToolKind::Masscan => None,
            },
        };

        let hosts = match tool {
            ToolKind::Nmap => self.nmap_hosts(root, session.args.as_deref().unwrap_or_default()),
            ToolKind::Masscan => masscan_hosts(root),
        };

        debug!(
            file = %file.display(),
            hosts = hosts.len(),
            "Parsed {tool} results"
        );
        self.history.push(session.clone());
        Some(ParseOutcome { session, hosts })
    }

    fn nmap_hosts(&self, root: Node, args: &str) -> Vec<Host> {
        let flags: Vec<&str> = args.split_whitespace().collect();
        if flags.contains(&LIST_SCAN_FLAG) {
            debug!("List scan results carry no ports, hosts discarded");
            return Vec::new();
        }
        let arp_sweep = ARP_SWEEP_FLAGS.iter().all(|flag| flags.contains(flag));

        children(root, "host")
            .filter_map(|node| self.nmap_host(node))
            .filter(|host| !arp_sweep || host.hostname.is_some())
            .collect()
    }

    fn nmap_host(&self, node: Node) -> Option<Host> {
        let mut ipv4 = None;
        let mut ipv6 = None;
        let mut mac = None;
        let mut vendor = None;

        for address in children(node, "address") {
            let addr = address.attribute("addr");
            match address.attribute("addrtype") {
                Some("ipv4") => ipv4 = addr,
                Some("ipv6") => ipv6 = addr,
                Some("mac") => {
                    mac = addr;
                    vendor = address.attribute("vendor");
                }
                _ => {}
            }
        }

        let Some(addr) = ipv4.or(ipv6) else {
            debug!("Skipping host element without an IP address");
            return None;
        };
        let mut host = Host::new(addr);

        if let Some(mac) = mac {
            host = host.with_mac(mac);
            let vendor = vendor
                .map(String::from)
                .or_else(|| self.vendors.as_ref().and_then(|repo| repo.get_vendor(mac)));
            host.vendor = vendor;
        }

        host.hostname = children(node, "hostnames")
            .flat_map(|hostnames| children(hostnames, "hostname"))
            .filter(|hostname| hostname.attribute("type") == Some("PTR"))
            .filter_map(|hostname| hostname.attribute("name"))
            .last()
            .map(String::from);

        for port in children(node, "ports").flat_map(|ports| children(ports, "port")) {
            if let Some(port) = read_port(port) {
                host.add_port(port);
            }
        }
        Some(host)
    }
}

/// Masscan writes one `<host>` element per socket.
fn masscan_hosts(root: Node) -> Vec<Host> {
    let mut hosts: Vec<Host> = Vec::new();

    for node in children(root, "host") {
        let Some(addr) = children(node, "address").find_map(|a| a.attribute("addr")) else {
            debug!("Skipping host element without an address");
            continue;
        };
        let port = children(node, "ports")
            .flat_map(|ports| children(ports, "port"))
            .next()
            .and_then(read_port);

        let index = match hosts.iter().position(|host| host.addr == addr) {
            Some(index) => index,
            None => {
                hosts.push(Host::new(addr));
                hosts.len() - 1
            }
        };
        if let Some(port) = port {
            hosts[index].add_port(port);
        }
    }
    hosts
}

fn read_port(node: Node) -> Option<Port> {
    let portid = node.attribute("portid")?;
    let protocol = match node.attribute("protocol")?.parse::<Protocol>() {
        Ok(protocol) => protocol,
        Err(e) => {
            debug!("Skipping port {portid}: {e}");
            return None;
        }
    };

    let mut port = Port::new(portid, protocol);
    if let Some(state) = children(node, "state").find_map(|s| s.attribute("state")) {
        port = port.with_state(state);
    }
    Some(port)
}

fn children<'a, 'input: 'a>(node: Node<'a, 'input>, tag: &'a str) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |child| child.has_tag_name(tag))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(raw.trim().parse().ok()?, 0)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
