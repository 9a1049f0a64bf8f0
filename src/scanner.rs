//! ARP sweep of every attached subnet.
//!
//! ARP is mandatory on the segment and hosts cannot firewall it away, so a
//! who-has sweep has better recall than a ping sweep.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pnet::util::MacAddr;
use tracing::{debug, info, warn};

use crate::engine::registry::Host;
use crate::link::{ArpOp, LinkLayer};
use crate::net::Interface;

/// Small gap between probes so the kernel TX ring keeps up on wide subnets.
const PROBE_PACING: Duration = Duration::from_micros(100);

/// How long to keep collecting replies after the probes are out.
const RECV_WINDOW: Duration = Duration::from_millis(1000);

pub struct NetworkScanner {
    link: Arc<dyn LinkLayer>,
}

impl NetworkScanner {
    pub fn new(link: Arc<dyn LinkLayer>) -> Self {
        Self { link }
    }

    /// Sweep every interface and return the responders, deduplicated on IP
    /// with the first reply winning. A failing interface is logged and
    /// skipped; it never aborts the others.
    pub fn scan(&self, interfaces: &[Interface]) -> Vec<Host> {
        let start = Instant::now();
        let mut discovered: HashMap<Ipv4Addr, Host> = HashMap::new();

        for iface in interfaces {
            self.sweep(iface, &mut discovered);
        }

        info!(
            "scan found {} host(s) in {}ms",
            discovered.len(),
            start.elapsed().as_millis()
        );
        discovered.into_values().collect()
    }

    fn sweep(&self, iface: &Interface, discovered: &mut HashMap<Ipv4Addr, Host>) {
        let targets = iface.host_addresses();
        let mut send_failures = 0usize;

        for addr in &targets {
            if let Err(e) = self.link.send_arp(
                iface,
                ArpOp::Request,
                iface.mac,
                iface.ip,
                MacAddr::zero(),
                *addr,
            ) {
                if send_failures == 0 {
                    debug!("probe to {} on {} failed: {}", addr, iface.name, e);
                }
                send_failures += 1;
                continue;
            }
            if !PROBE_PACING.is_zero() {
                std::thread::sleep(PROBE_PACING);
            }
        }

        if send_failures > 0 {
            warn!(
                "{}/{} probes failed on {}",
                send_failures,
                targets.len(),
                iface.name
            );
        }

        let deadline = Instant::now() + RECV_WINDOW;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.link.recv_arp(iface, deadline - now) {
                Some((ip, mac)) => {
                    discovered
                        .entry(ip)
                        .or_insert_with(|| Host::discovered(ip, mac));
                }
                None => break,
            }
        }
    }
}
