//! # Scan Target Specification
//!
//! Validates the target strings handed to the scanners before any process is
//! launched. A specification is a comma separated list of:
//! * A single IP address (e.g. `10.0.0.5`, `fe80::1`).
//! * An IPv4 range (e.g. `192.168.1.1-100`, `10.0.0.1-10.0.1.255`).
//! * A CIDR block (e.g. `192.168.1.0/24`).
//! * The keywords `auto` / `lan`, resolved to the network of the primary
//!   LAN interface.
//!
//! Both scanners accept the same textual forms, so a resolved specification is
//! rendered back into a string rather than expanded into addresses.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use pnet::ipnetwork::IpNetwork;
use tracing::info;

use crate::network::interface;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetItem {
    /// The private network of the primary LAN interface.
    Lan,
    Host(IpAddr),
    Range { start: Ipv4Addr, end: Ipv4Addr },
    Cidr(IpNetwork),
}

impl fmt::Display for TargetItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetItem::Lan => f.write_str("lan"),
            TargetItem::Host(addr) => write!(f, "{addr}"),
            TargetItem::Range { start, end } => write!(f, "{start}-{end}"),
            TargetItem::Cidr(net) => write!(f, "{net}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetSpec {
    items: Vec<TargetItem>,
}

impl TargetSpec {
    pub fn items(&self) -> &[TargetItem] {
        &self.items
    }

    pub fn needs_lan(&self) -> bool {
        self.items.contains(&TargetItem::Lan)
    }

    /// Renders the specification, replacing `lan` with the detected network.
    pub fn resolve(&self) -> anyhow::Result<String> {
        let mut parts = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item {
                TargetItem::Lan => {
                    let net = interface::primary_lan_network()?;
                    info!("Resolved LAN target to {net}");
                    parts.push(net.to_string());
                }
                other => parts.push(other.to_string()),
            }
        }
        Ok(parts.join(","))
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.items.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for TargetSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let items = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_item)
            .collect::<Result<Vec<_>, _>>()?;

        if items.is_empty() {
            return Err(String::from("target cannot be empty"));
        }
        Ok(Self { items })
    }
}

fn parse_item(s: &str) -> Result<TargetItem, String> {
    match s.to_ascii_lowercase().as_str() {
        "auto" | "lan" => return Ok(TargetItem::Lan),
        _ => {}
    }

    if let Ok(addr) = s.parse::<IpAddr>() {
        return Ok(TargetItem::Host(addr));
    }

    if let Some(item) = parse_ip_range(s)? {
        return Ok(item);
    }

    if let Some(item) = parse_cidr(s)? {
        return Ok(item);
    }

    Err(format!("invalid target: {s}"))
}

/// Parses `1.1.1.1-2.2.2.2` or the abbreviated `1.1.1.1-50`.
fn parse_ip_range(s: &str) -> Result<Option<TargetItem>, String> {
    let Some((start_str, end_str)) = s.split_once('-') else {
        return Ok(None);
    };

    let start = start_str
        .parse::<Ipv4Addr>()
        .map_err(|e| format!("Invalid start IP in range '{start_str}': {e}"))?;
    let end = parse_range_end(end_str, &start, s)?;

    if u32::from(start) > u32::from(end) {
        return Err(format!("Range start is after its end: {s}"));
    }

    Ok(Some(TargetItem::Range { start, end }))
}

/// Fills the leading octets of an abbreviated range end from `start`.
fn parse_range_end(end_str: &str, start: &Ipv4Addr, original: &str) -> Result<Ipv4Addr, String> {
    if let Ok(full) = end_str.parse::<Ipv4Addr>() {
        return Ok(full);
    }
    if end_str.is_empty() {
        return Err(format!("End range cannot be empty: {original}"));
    }

    let partial: Vec<u8> = end_str
        .split('.')
        .map(str::parse::<u8>)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Invalid end range '{end_str}': {e}"))?;

    if partial.len() > 4 {
        return Err(format!("End range has too many octets: {end_str}"));
    }

    let mut octets = start.octets();
    octets[4 - partial.len()..].copy_from_slice(&partial);
    Ok(Ipv4Addr::from(octets))
}

fn parse_cidr(s: &str) -> Result<Option<TargetItem>, String> {
    if !s.contains('/') {
        return Ok(None);
    }
    s.parse::<IpNetwork>()
        .map(|net| Some(TargetItem::Cidr(net)))
        .map_err(|e| format!("Invalid CIDR '{s}': {e}"))
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

    #[test]
    fn abbreviated_range_ends() {
        let start = Ipv4Addr::new(192, 168, 1, 10);
        let s = "192.168.1.10-255";

        assert_eq!(parse_range_end("50", &start, s), Ok(Ipv4Addr::new(192, 168, 1, 50)));
        assert_eq!(parse_range_end("2.66", &start, s), Ok(Ipv4Addr::new(192, 168, 2, 66)));
        assert_eq!(parse_range_end("10.2.1", &start, s), Ok(Ipv4Addr::new(192, 10, 2, 1)));
        assert_eq!(
            parse_range_end("192.168.1.50", &start, s),
            Ok(Ipv4Addr::new(192, 168, 1, 50))
        );

        assert!(parse_range_end("2.256", &start, s).is_err());
        assert!(parse_range_end("1.2.3.4.5", &start, s).is_err());
        assert!(parse_range_end("", &start, s).is_err());
    }

    #[test]
    fn parses_every_item_kind() {
        let spec: TargetSpec = "lan, 10.0.0.5,::1, 192.168.1.1-20, 10.0.0.0/24".parse().unwrap();
        assert_eq!(spec.items().len(), 5);
        assert!(spec.needs_lan());
        assert_eq!(spec.items()[0], TargetItem::Lan);
        assert!(matches!(spec.items()[2], TargetItem::Host(IpAddr::V6(_))));
        assert_eq!(
            spec.items()[3],
            TargetItem::Range {
                start: Ipv4Addr::new(192, 168, 1, 1),
                end: Ipv4Addr::new(192, 168, 1, 20),
            }
        );
    }

    #[test]
    fn renders_canonical_text() {
        let spec: TargetSpec = "10.0.0.1-50,10.1.0.0/16".parse().unwrap();
        assert_eq!(spec.to_string(), "10.0.0.1-10.0.0.50,10.1.0.0/16");
        assert!(!spec.needs_lan());
        assert_eq!(spec.resolve().unwrap(), "10.0.0.1-10.0.0.50,10.1.0.0/16");
    }

    #[test]
    fn rejects_invalid_targets() {
        assert!("not-an-ip".parse::<TargetSpec>().is_err());
        assert!("10.0.0.1/33".parse::<TargetSpec>().is_err());
        assert!("10.0.0.256-1.1.1.1".parse::<TargetSpec>().is_err());
        assert!("10.0.0.50-10".parse::<TargetSpec>().is_err());
        assert!(" , ".parse::<TargetSpec>().is_err());
    }
}
