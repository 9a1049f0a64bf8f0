//! Interface inventory and address utilities.

use std::net::{IpAddr, Ipv4Addr};

use pnet::datalink;
use pnet::util::MacAddr;
use rand::Rng;

use crate::error::EngineError;

/// An attached IPv4 interface, snapshotted at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mac: MacAddr,
}

impl Interface {
    /// Whether `ip` falls inside this interface's subnet.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.netmask);
        u32::from(ip) & mask == u32::from(self.ip) & mask
    }

    /// Whether `ip` is another host on this interface's subnet.
    pub fn same_subnet(&self, ip: Ipv4Addr) -> bool {
        ip != self.ip && self.contains(ip)
    }

    /// Every host-bit address of the subnet except our own, the network
    /// address and the broadcast address. This is the sweep range.
    pub fn host_addresses(&self) -> Vec<Ipv4Addr> {
        let mask = u32::from(self.netmask);
        let network = u32::from(self.ip) & mask;
        let broadcast = network | !mask;
        ((network + 1)..broadcast)
            .map(Ipv4Addr::from)
            .filter(|addr| *addr != self.ip)
            .collect()
    }
}

/// Enumerate operational IPv4 interfaces. Loopback, down, and addressless
/// interfaces are skipped. Interfaces are assumed not to change while the
/// process runs, so callers snapshot this once.
pub fn list_interfaces() -> Vec<Interface> {
    datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .filter_map(|iface| {
            let mac = iface.mac?;
            let (ip, netmask) = iface.ips.iter().find_map(|network| match network.ip() {
                IpAddr::V4(v4) if !v4.is_loopback() => match network.mask() {
                    IpAddr::V4(mask) => Some((v4, mask)),
                    _ => None,
                },
                _ => None,
            })?;
            Some(Interface {
                name: iface.name,
                ip,
                netmask,
                mac,
            })
        })
        .collect()
}

/// Find the interface whose subnet contains `ip`.
pub fn interface_for_ip(interfaces: &[Interface], ip: Ipv4Addr) -> Result<&Interface, EngineError> {
    interfaces
        .iter()
        .find(|iface| iface.contains(ip))
        .ok_or(EngineError::NoInterface(ip))
}

/// Generate a random locally-administered unicast MAC: the low two bits of
/// the first octet are forced to `10`.
pub fn random_fake_mac() -> MacAddr {
    let mut octets: [u8; 6] = rand::thread_rng().gen();
    octets[0] = (octets[0] & 0xfc) | 0x02;
    MacAddr::new(
        octets[0], octets[1], octets[2], octets[3], octets[4], octets[5],
    )
}
