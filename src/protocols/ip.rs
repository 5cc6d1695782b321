// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IPv4 header assembly for raw (IP_HDRINCL) sends

use std::net::Ipv4Addr;

use super::PacketBuilder;

/// IP protocol number for IGMP
pub const IPPROTO_IGMP: u8 = 2;

/// Minimum IPv4 header length
pub const IPV4_HEADER_LEN: usize = 20;

/// Router Alert option (RFC 2113): type 0x94 (copied, class 0, number 20),
/// length 4, value 0 ("router shall examine packet")
pub const ROUTER_ALERT_OPTION: [u8; 4] = [0x94, 0x04, 0x00, 0x00];

/// TOS used for routing-protocol traffic: DSCP CS6, ECN 0
pub const TOS_INTERNETWORK_CONTROL: u8 = 0xc0;

/// IPv4 header fields for one raw datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    /// 0.0.0.0 lets the kernel pick the outgoing address
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub ttl: u8,
    pub tos: u8,
    pub protocol: u8,
    pub router_alert: bool,
}

impl Ipv4Header {
    /// Link-local IGMP header: TTL 1, TOS CS6
    pub fn igmp(source: Ipv4Addr, destination: Ipv4Addr, router_alert: bool) -> Self {
        Self {
            source,
            destination,
            ttl: 1,
            tos: TOS_INTERNETWORK_CONTROL,
            protocol: IPPROTO_IGMP,
            router_alert,
        }
    }

    /// Header length in bytes, options included
    pub fn header_len(&self) -> usize {
        if self.router_alert {
            IPV4_HEADER_LEN + ROUTER_ALERT_OPTION.len()
        } else {
            IPV4_HEADER_LEN
        }
    }

    /// Header followed by `payload`, with the header checksum filled in
    pub fn encapsulate(&self, payload: &[u8]) -> Vec<u8> {
        let header_len = self.header_len();
        let total_len = header_len + payload.len();
        let mut packet = vec![0u8; total_len];

        packet[0] = 0x40 | (header_len / 4) as u8; // Version 4, IHL in 32-bit words
        packet[1] = self.tos;
        packet[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
        // Identification, flags and fragment offset stay zero (kernel fills the id)
        packet[8] = self.ttl;
        packet[9] = self.protocol;
        packet[12..16].copy_from_slice(&self.source.octets());
        packet[16..20].copy_from_slice(&self.destination.octets());
        if self.router_alert {
            packet[IPV4_HEADER_LEN..header_len].copy_from_slice(&ROUTER_ALERT_OPTION);
        }

        let checksum = self.calculate_checksum(&packet[..header_len]);
        packet[10..12].copy_from_slice(&checksum.to_be_bytes());

        packet[header_len..].copy_from_slice(payload);
        packet
    }
}

impl PacketBuilder for Ipv4Header {
    fn build(&self) -> Vec<u8> {
        self.encapsulate(&[])
    }
}

/// Assemble one raw datagram carrying `payload`
pub fn build_ip_packet(header: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
    header.encapsulate(payload)
}
