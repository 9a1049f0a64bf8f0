use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use pnet::util::MacAddr;

/// Lifecycle state of a known host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Normal,
    Cut,
}

/// A host discovered on an attached subnet. Identity is the IP; the MAC is
/// whatever answered the first probe.
#[derive(Debug, Clone)]
pub struct Host {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub status: HostStatus,
    pub first_seen: DateTime<Utc>,
}

impl Host {
    pub fn discovered(ip: Ipv4Addr, mac: MacAddr) -> Self {
        Self {
            ip,
            mac,
            status: HostStatus::Normal,
            first_seen: Utc::now(),
        }
    }

    pub fn is_cut(&self) -> bool {
        self.status == HostStatus::Cut
    }
}

/// The authoritative set of known hosts, keyed and ordered by IP.
///
/// The registry only ever grows: a host that stops answering scans stays
/// listed and simply becomes unreachable. Merging never touches existing
/// entries, so statuses survive rescans and the first-heard MAC wins.
#[derive(Default)]
pub struct HostRegistry {
    hosts: BTreeMap<Ipv4Addr, Host>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, discovered: Vec<Host>) {
        for host in discovered {
            self.hosts.entry(host.ip).or_insert(host);
        }
    }

    pub fn get(&self, ip: Ipv4Addr) -> Option<&Host> {
        self.hosts.get(&ip)
    }

    pub fn set_status(&mut self, ip: Ipv4Addr, status: HostStatus) {
        if let Some(host) = self.hosts.get_mut(&ip) {
            host.status = status;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// Ordered snapshot for the command surface.
    pub fn snapshot(&self) -> Vec<Host> {
        self.hosts.values().cloned().collect()
    }

    pub fn cut_ips(&self) -> Vec<Ipv4Addr> {
        self.hosts
            .values()
            .filter(|host| host.is_cut())
            .map(|host| host.ip)
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }
}
