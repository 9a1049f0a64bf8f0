//! Recording link layer for tests: captures every frame the engine emits and
//! plays back scripted scan replies per interface.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use pnet::util::MacAddr;

use crate::error::EngineError;
use crate::net::Interface;

use super::{ArpOp, LinkLayer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub iface: String,
    pub op: ArpOp,
    pub src_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_mac: MacAddr,
    pub dst_ip: Ipv4Addr,
}

#[derive(Default)]
pub struct MockLink {
    sent: Mutex<Vec<SentFrame>>,
    replies: Mutex<HashMap<String, VecDeque<(Ipv4Addr, MacAddr)>>>,
    fail_sends: AtomicBool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a scan reply to be heard on `iface_name`.
    pub fn queue_reply(&self, iface_name: &str, ip: Ipv4Addr, mac: MacAddr) {
        self.replies
            .lock()
            .unwrap()
            .entry(iface_name.to_string())
            .or_default()
            .push_back((ip, mac));
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

impl LinkLayer for MockLink {
    fn send_arp(
        &self,
        iface: &Interface,
        op: ArpOp,
        src_mac: MacAddr,
        src_ip: Ipv4Addr,
        dst_mac: MacAddr,
        dst_ip: Ipv4Addr,
    ) -> Result<(), EngineError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(EngineError::Io(std::io::Error::other("mock send failure")));
        }
        self.sent.lock().unwrap().push(SentFrame {
            iface: iface.name.clone(),
            op,
            src_mac,
            src_ip,
            dst_mac,
            dst_ip,
        });
        Ok(())
    }

    fn recv_arp(&self, iface: &Interface, _timeout: Duration) -> Option<(Ipv4Addr, MacAddr)> {
        self.replies
            .lock()
            .unwrap()
            .get_mut(&iface.name)
            .and_then(VecDeque::pop_front)
    }
}
