//! Raw-frame ARP send/receive over a chosen interface.

pub mod raw;

#[cfg(test)]
pub mod mock;

use std::net::Ipv4Addr;
use std::time::Duration;

use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;

use crate::error::EngineError;
use crate::net::Interface;

/// Ethernet header (14) + ARP payload (28).
pub const ARP_FRAME_LEN: usize = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
}

/// Link-layer boundary of the engine. The production implementation is
/// [`raw::RawLink`]; tests substitute a recording mock.
pub trait LinkLayer: Send + Sync {
    /// Emit one ARP packet on `iface`. The Ethernet destination follows
    /// `dst_mac`, except that the all-zero target of a who-has probe goes
    /// out as Ethernet broadcast.
    fn send_arp(
        &self,
        iface: &Interface,
        op: ArpOp,
        src_mac: MacAddr,
        src_ip: Ipv4Addr,
        dst_mac: MacAddr,
        dst_ip: Ipv4Addr,
    ) -> Result<(), EngineError>;

    /// Next ARP reply heard on `iface` within `timeout`, as
    /// (sender IP, sender MAC). Our own transmissions are filtered out.
    fn recv_arp(&self, iface: &Interface, timeout: Duration) -> Option<(Ipv4Addr, MacAddr)>;
}

/// Build the full Ethernet+ARP frame for [`LinkLayer::send_arp`].
pub fn build_arp_frame(
    op: ArpOp,
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_mac: MacAddr,
    dst_ip: Ipv4Addr,
) -> Result<[u8; ARP_FRAME_LEN], EngineError> {
    let mut arp_buffer = [0u8; 28];
    let mut arp_packet = MutableArpPacket::new(&mut arp_buffer)
        .ok_or_else(|| std::io::Error::other("ARP buffer too small"))?;

    arp_packet.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp_packet.set_protocol_type(EtherTypes::Ipv4);
    arp_packet.set_hw_addr_len(6);
    arp_packet.set_proto_addr_len(4);
    arp_packet.set_operation(match op {
        ArpOp::Request => ArpOperations::Request,
        ArpOp::Reply => ArpOperations::Reply,
    });
    arp_packet.set_sender_hw_addr(src_mac);
    arp_packet.set_sender_proto_addr(src_ip);
    arp_packet.set_target_hw_addr(dst_mac);
    arp_packet.set_target_proto_addr(dst_ip);

    let mut ethernet_buffer = [0u8; ARP_FRAME_LEN];
    let mut ethernet_packet = MutableEthernetPacket::new(&mut ethernet_buffer)
        .ok_or_else(|| std::io::Error::other("Ethernet buffer too small"))?;

    ethernet_packet.set_destination(if dst_mac == MacAddr::zero() {
        MacAddr::broadcast()
    } else {
        dst_mac
    });
    ethernet_packet.set_source(src_mac);
    ethernet_packet.set_ethertype(EtherTypes::Arp);
    ethernet_packet.set_payload(arp_packet.packet());

    Ok(ethernet_buffer)
}

/// Extract (sender IP, sender MAC) from an ARP reply frame. Returns None for
/// non-ARP traffic, requests, and frames we sent ourselves.
pub fn parse_arp_reply(frame: &[u8], own_mac: MacAddr) -> Option<(Ipv4Addr, MacAddr)> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }
    if arp.get_sender_hw_addr() == own_mac {
        return None;
    }

    Some((arp.get_sender_proto_addr(), arp.get_sender_hw_addr()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC_MAC: MacAddr = MacAddr(0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0xaa);
    const DST_MAC: MacAddr = MacAddr(0x11, 0x22, 0x33, 0x44, 0x55, 0x66);

    #[test]
    fn probe_goes_out_as_broadcast() {
        let frame = build_arp_frame(
            ArpOp::Request,
            SRC_MAC,
            Ipv4Addr::new(192, 168, 1, 10),
            MacAddr::zero(),
            Ipv4Addr::new(192, 168, 1, 1),
        )
        .unwrap();

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(eth.get_source(), SRC_MAC);
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);

        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_hardware_type(), ArpHardwareTypes::Ethernet);
        assert_eq!(arp.get_hw_addr_len(), 6);
        assert_eq!(arp.get_proto_addr_len(), 4);
        assert_eq!(arp.get_sender_hw_addr(), SRC_MAC);
        assert_eq!(arp.get_sender_proto_addr(), Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(arp.get_target_hw_addr(), MacAddr::zero());
        assert_eq!(arp.get_target_proto_addr(), Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn reply_is_unicast_to_destination() {
        let frame = build_arp_frame(
            ArpOp::Reply,
            SRC_MAC,
            Ipv4Addr::new(192, 168, 1, 1),
            DST_MAC,
            Ipv4Addr::new(192, 168, 1, 20),
        )
        .unwrap();

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), DST_MAC);

        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Reply);
    }

    #[test]
    fn parse_accepts_foreign_replies_only() {
        let own_mac = SRC_MAC;
        let reply = build_arp_frame(
            ArpOp::Reply,
            DST_MAC,
            Ipv4Addr::new(192, 168, 1, 1),
            own_mac,
            Ipv4Addr::new(192, 168, 1, 10),
        )
        .unwrap();
        assert_eq!(
            parse_arp_reply(&reply, own_mac),
            Some((Ipv4Addr::new(192, 168, 1, 1), DST_MAC))
        );

        // A request is not a reply.
        let request = build_arp_frame(
            ArpOp::Request,
            DST_MAC,
            Ipv4Addr::new(192, 168, 1, 1),
            MacAddr::zero(),
            Ipv4Addr::new(192, 168, 1, 10),
        )
        .unwrap();
        assert_eq!(parse_arp_reply(&request, own_mac), None);

        // Our own reply echoed back must be ignored.
        let own = build_arp_frame(
            ArpOp::Reply,
            own_mac,
            Ipv4Addr::new(192, 168, 1, 10),
            DST_MAC,
            Ipv4Addr::new(192, 168, 1, 1),
        )
        .unwrap();
        assert_eq!(parse_arp_reply(&own, own_mac), None);

        // Truncated garbage.
        assert_eq!(parse_arp_reply(&[0u8; 10], own_mac), None);
    }
}
