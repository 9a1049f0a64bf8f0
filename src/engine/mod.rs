//! Target lifecycle controller: owns the host registry, the per-target
//! attack sessions, and the fake-MAC assignments behind one coarse lock.

pub mod registry;
pub mod session;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pnet::util::MacAddr;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::link::LinkLayer;
use crate::net::{self, Interface};
use crate::scanner::NetworkScanner;

pub use registry::{Host, HostStatus};

use registry::HostRegistry;
use session::{AttackSession, Peer};

/// Outcome of the cut/restore toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    CutSuccess,
    RecoverSuccess,
    TargetNotFound,
}

/// Everything the command handlers mutate, guarded together. Command latency
/// is dominated by sweeps and raw I/O, not this lock; flows run on snapshots
/// and never take it.
struct EngineState {
    registry: HostRegistry,
    sessions: HashMap<Ipv4Addr, AttackSession>,
    fake_macs: HashMap<Ipv4Addr, MacAddr>,
    last_scan: Option<Instant>,
}

pub struct Controller {
    link: Arc<dyn LinkLayer>,
    interfaces: Vec<Interface>,
    scanner: NetworkScanner,
    attack_interval: Duration,
    scan_interval: Duration,
    atk_value: AtomicI64,
    def_value: AtomicI64,
    state: Mutex<EngineState>,
}

impl Controller {
    pub fn new(
        link: Arc<dyn LinkLayer>,
        interfaces: Vec<Interface>,
        attack_interval: Duration,
        scan_interval: Duration,
    ) -> Self {
        Self {
            scanner: NetworkScanner::new(link.clone()),
            link,
            interfaces,
            attack_interval,
            scan_interval,
            atk_value: AtomicI64::new(1),
            def_value: AtomicI64::new(0),
            state: Mutex::new(EngineState {
                registry: HostRegistry::new(),
                sessions: HashMap::new(),
                fake_macs: HashMap::new(),
                last_scan: None,
            }),
        }
    }

    /// Sweep the attached subnets and merge responders into the registry,
    /// unless a sweep already ran within the scan interval.
    pub fn scan_targets(&self) {
        let mut state = self.state.lock().unwrap();

        if let Some(last) = state.last_scan {
            if last.elapsed() < self.scan_interval {
                debug!("scan skipped, last sweep {}ms ago", last.elapsed().as_millis());
                return;
            }
        }

        let discovered = self.scanner.scan(&self.interfaces);
        state.registry.merge(discovered);
        state.last_scan = Some(Instant::now());
    }

    /// Ordered snapshot of every known host.
    pub fn get_targets(&self) -> Vec<Host> {
        self.state.lock().unwrap().registry.snapshot()
    }

    pub fn get_host(&self, ip: Ipv4Addr) -> Option<Host> {
        self.state.lock().unwrap().registry.get(ip).cloned()
    }

    /// The toggle primitive: cut a Normal target, restore a Cut one.
    pub fn action(&self, ip: Ipv4Addr) -> Result<ActionStatus, EngineError> {
        let mut state = self.state.lock().unwrap();

        let Some(target) = state.registry.get(ip).cloned() else {
            return Ok(ActionStatus::TargetNotFound);
        };

        if target.is_cut() {
            self.recover(&mut state, ip);
            Ok(ActionStatus::RecoverSuccess)
        } else {
            self.attack(&mut state, &target)?;
            Ok(ActionStatus::CutSuccess)
        }
    }

    /// Restore every cut target. Called on `/quit` and interrupt; nothing may
    /// stay poisoned past process exit.
    pub fn recover_all(&self) {
        let mut state = self.state.lock().unwrap();
        for ip in state.registry.cut_ips() {
            self.recover(&mut state, ip);
        }
    }

    /// Start (or extend) the attack session for `target`: one flow per known
    /// host on the target's subnet. Re-entry on a cut target only adds flows
    /// for victims discovered since the last cut.
    fn attack(&self, state: &mut EngineState, target: &Host) -> Result<(), EngineError> {
        // Resolve the interface before touching any state, so an off-link
        // target leaves everything exactly as it was.
        let iface = net::interface_for_ip(&self.interfaces, target.ip)?.clone();

        let victims: Vec<Peer> = state
            .registry
            .iter()
            .filter(|host| host.ip != target.ip && iface.same_subnet(host.ip))
            .map(|host| Peer {
                ip: host.ip,
                mac: host.mac,
            })
            .collect();

        let EngineState {
            registry,
            sessions,
            fake_macs,
            ..
        } = state;

        let session = sessions.entry(target.ip).or_insert_with(|| {
            AttackSession::new(
                Peer {
                    ip: target.ip,
                    mac: target.mac,
                },
                iface,
            )
        });

        for victim in victims {
            if session.has_flow(victim.ip) {
                continue;
            }
            let fake_mac = *fake_macs
                .entry(victim.ip)
                .or_insert_with(net::random_fake_mac);
            session.spawn_flow(self.link.clone(), victim, fake_mac, self.attack_interval);
        }

        registry.set_status(target.ip, HostStatus::Cut);
        info!("cut {} ({} victim flow(s))", target.ip, session.victim_ips().len());
        Ok(())
    }

    /// Tear down the target's session. Flows emit their restorative true-MAC
    /// pair on the way out and are joined here, so every victim has been
    /// rebound before this returns. Without a session this is a no-op apart
    /// from the status reset.
    fn recover(&self, state: &mut EngineState, ip: Ipv4Addr) {
        if let Some(mut session) = state.sessions.remove(&ip) {
            session.shut_down();
            info!("recovered {}", ip);
        }
        state.registry.set_status(ip, HostStatus::Normal);
    }

    pub fn get_atk(&self) -> i64 {
        self.atk_value.load(Ordering::SeqCst)
    }

    pub fn set_atk(&self, value: i64) {
        self.atk_value.store(value, Ordering::SeqCst);
    }

    pub fn get_def(&self) -> i64 {
        self.def_value.load(Ordering::SeqCst)
    }

    pub fn set_def(&self, value: i64) {
        self.def_value.store(value, Ordering::SeqCst);
    }
}
