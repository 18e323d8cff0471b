//! Resolves the `auto` target to the private IPv4 network of the primary
//! LAN interface.

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use tracing::debug;

#[cfg(target_os = "linux")]
use linux_impl::{is_physical, is_wireless};
#[cfg(not(target_os = "linux"))]
use fallback_impl::{is_physical, is_wireless};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Rejection {
    IsDown,
    NotPhysical,
    IsPointToPoint,
    /// No private IPv4 network assigned, so there is nothing to sweep.
    NoPrivateIpv4,
}

/// Finds the private IPv4 network of the best LAN interface on this machine.
pub fn primary_lan_network() -> anyhow::Result<Ipv4Network> {
    let interfaces: Vec<NetworkInterface> = datalink::interfaces()
        .into_iter()
        .filter(|interface| match check_candidate(interface, is_physical) {
            Ok(()) => true,
            Err(reason) => {
                debug!("Skipping interface {}: {reason:?}", interface.name);
                false
            }
        })
        .collect();

    let Some(interface) = select_best(interfaces, is_wired) else {
        anyhow::bail!("No interface with a private IPv4 network is available");
    };

    private_ipv4(&interface)
        .ok_or_else(|| anyhow::anyhow!("Interface {} lost its IPv4 network", interface.name))
}

fn private_ipv4(interface: &NetworkInterface) -> Option<Ipv4Network> {
    interface.ips.iter().find_map(|net| match net {
        IpNetwork::V4(v4) if v4.ip().is_private() => Ipv4Network::new(v4.network(), v4.prefix()).ok(),
        _ => None,
    })
}

fn check_candidate(
    interface: &NetworkInterface,
    is_physical: impl Fn(&NetworkInterface) -> bool,
) -> Result<(), Rejection> {
    if !interface.is_up() {
        return Err(Rejection::IsDown);
    }
    if interface.is_loopback() || !is_physical(interface) {
        return Err(Rejection::NotPhysical);
    }
    if interface.is_point_to_point() {
        return Err(Rejection::IsPointToPoint);
    }
    if private_ipv4(interface).is_none() {
        return Err(Rejection::NoPrivateIpv4);
    }
    Ok(())
}

fn select_best(
    interfaces: Vec<NetworkInterface>,
    is_wired: impl Fn(&NetworkInterface) -> bool,
) -> Option<NetworkInterface> {
    interfaces
        .iter()
        .find(|interface| is_wired(interface))
        .or_else(|| interfaces.first())
        .cloned()
}

fn is_wired(interface: &NetworkInterface) -> bool {
    is_physical(interface) && !is_wireless(interface)
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::path::Path;

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/device", interface.name)).exists()
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/wireless", interface.name)).exists()
    }
}

#[cfg(not(target_os = "linux"))]
mod fallback_impl {
    use super::*;

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        !interface.is_loopback() && interface.mac.is_some()
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        interface.name.starts_with("wl")
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

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::util::MacAddr;

    const IFF_UP: u32 = 1;
    const IFF_BROADCAST: u32 = 1 << 1;
    const IFF_LOOPBACK: u32 = 1 << 3;
    const IFF_POINTTOPOINT: u32 = 1 << 4;

    fn mock_interface(name: &str, ips: Vec<IpNetwork>, flags: u32) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            description: "An interface".to_string(),
            index: 0,
            mac: Some(MacAddr(0x1, 0x2, 0x3, 0x4, 0x5, 0x6)),
            ips,
            flags,
        }
    }

    fn lan_ips() -> Vec<IpNetwork> {
        vec![IpNetwork::V4("192.168.1.100/24".parse().unwrap())]
    }

    #[test]
    fn private_network_is_reported_as_network_address() {
        let interface = mock_interface("eth0", lan_ips(), IFF_UP | IFF_BROADCAST);
        let net = private_ipv4(&interface).unwrap();
        assert_eq!(net.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn candidate_accepts_physical_lan_interface() {
        let interface = mock_interface("eth0", lan_ips(), IFF_UP | IFF_BROADCAST);
        assert_eq!(check_candidate(&interface, |_| true), Ok(()));
    }

    #[test]
    fn candidate_rejections() {
        let down = mock_interface("eth0", lan_ips(), IFF_BROADCAST);
        assert_eq!(check_candidate(&down, |_| true), Err(Rejection::IsDown));

        let lo = mock_interface("lo", lan_ips(), IFF_UP | IFF_LOOPBACK);
        assert_eq!(check_candidate(&lo, |_| true), Err(Rejection::NotPhysical));

        let virt = mock_interface("veth0", lan_ips(), IFF_UP | IFF_BROADCAST);
        assert_eq!(check_candidate(&virt, |_| false), Err(Rejection::NotPhysical));

        let tun = mock_interface("tun0", lan_ips(), IFF_UP | IFF_POINTTOPOINT);
        assert_eq!(check_candidate(&tun, |_| true), Err(Rejection::IsPointToPoint));

        let public = vec![IpNetwork::V4("8.8.8.8/24".parse().unwrap())];
        let wan = mock_interface("eth1", public, IFF_UP | IFF_BROADCAST);
        assert_eq!(check_candidate(&wan, |_| true), Err(Rejection::NoPrivateIpv4));
    }

    #[test]
    fn select_best_prefers_wired() {
        let wlan = mock_interface("wlan0", lan_ips(), IFF_UP | IFF_BROADCAST);
        let eth = mock_interface("eth0", lan_ips(), IFF_UP | IFF_BROADCAST);
        let selected = select_best(vec![wlan.clone(), eth.clone()], |i| i.name == "eth0");
        assert_eq!(selected, Some(eth));

        let selected = select_best(vec![wlan.clone()], |_| false);
        assert_eq!(selected, Some(wlan));

        assert_eq!(select_best(Vec::new(), |_| true), None);
    }
}
