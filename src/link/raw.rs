//! Production link layer over `pnet` datalink channels.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender};
use pnet::util::MacAddr;

use crate::error::EngineError;
use crate::net::Interface;

use super::{build_arp_frame, parse_arp_reply, ArpOp, LinkLayer};

/// Upper bound on a single blocking read, so receive loops can honor their
/// deadline.
const READ_SLICE: Duration = Duration::from_millis(10);

struct ChannelPair {
    tx: Mutex<Box<dyn DataLinkSender>>,
    rx: Mutex<Box<dyn DataLinkReceiver>>,
}

/// Layer-2 channels, opened lazily and cached per interface for the process
/// lifetime. Opening requires CAP_NET_RAW (or root).
pub struct RawLink {
    channels: Mutex<HashMap<String, Arc<ChannelPair>>>,
}

impl RawLink {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channel(&self, iface: &Interface) -> Result<Arc<ChannelPair>, EngineError> {
        let mut channels = self.channels.lock().unwrap();
        if let Some(pair) = channels.get(&iface.name) {
            return Ok(pair.clone());
        }

        let pnet_iface = datalink::interfaces()
            .into_iter()
            .find(|candidate| candidate.name == iface.name)
            .ok_or_else(|| {
                std::io::Error::other(format!("interface {} disappeared", iface.name))
            })?;

        let config = Config {
            read_timeout: Some(READ_SLICE),
            ..Default::default()
        };
        let (tx, rx) = match datalink::channel(&pnet_iface, config) {
            Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(EngineError::Io(std::io::Error::other(
                    "unsupported datalink channel type",
                )))
            }
            Err(e) => {
                tracing::error!(
                    "failed to open {}: {} (raw sockets need root or CAP_NET_RAW)",
                    iface.name,
                    e
                );
                return Err(EngineError::Io(e));
            }
        };

        let pair = Arc::new(ChannelPair {
            tx: Mutex::new(tx),
            rx: Mutex::new(rx),
        });
        channels.insert(iface.name.clone(), pair.clone());
        Ok(pair)
    }
}

impl LinkLayer for RawLink {
    fn send_arp(
        &self,
        iface: &Interface,
        op: ArpOp,
        src_mac: MacAddr,
        src_ip: Ipv4Addr,
        dst_mac: MacAddr,
        dst_ip: Ipv4Addr,
    ) -> Result<(), EngineError> {
        let frame = build_arp_frame(op, src_mac, src_ip, dst_mac, dst_ip)?;
        let pair = self.channel(iface)?;
        let mut tx = pair.tx.lock().unwrap();

        match tx.send_to(&frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(EngineError::Io(e)),
            None => Err(EngineError::Io(std::io::Error::other(
                "datalink sender gave no completion",
            ))),
        }
    }

    fn recv_arp(&self, iface: &Interface, timeout: Duration) -> Option<(Ipv4Addr, MacAddr)> {
        let pair = self.channel(iface).ok()?;
        let mut rx = pair.rx.lock().unwrap();

        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            // Reads come back within READ_SLICE thanks to the channel config;
            // timeouts surface as Err and we just try again.
            if let Ok(frame) = rx.next() {
                if let Some(reply) = parse_arp_reply(frame, iface.mac) {
                    return Some(reply);
                }
            }
        }
        None
    }
}

impl Default for RawLink {
    fn default() -> Self {
        Self::new()
    }
}
