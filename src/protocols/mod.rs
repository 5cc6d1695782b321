// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Wire formats for raw IGMP traffic
//!
//! - **IGMP v1/v2 (RFC 1112, RFC 2236)**: 8-byte query, report and leave messages
//! - **IPv4 (RFC 791)**: minimum header plus the Router Alert option (RFC 2113)
//!
//! ## Packet Flow
//!
//! | Operation | IGMP type | Sent to |
//! |-----------|-----------|---------|
//! | Raw join | 0x12 / 0x16 | the group itself |
//! | Leave | 0x17 | 224.0.0.2 |
//! | General query | 0x11 | 224.0.0.1 |
//! | Group-specific query | 0x11 | the group itself |

pub mod igmp;
pub mod ip;

/// Builds a packet ready for transmission
pub trait PacketBuilder {
    /// Build a packet for transmission
    fn build(&self) -> Vec<u8>;

    /// Internet checksum of `data`
    fn calculate_checksum(&self, data: &[u8]) -> u16 {
        crate::checksum::checksum(data)
    }
}
