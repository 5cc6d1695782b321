// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IGMP v1/v2 message construction and parsing
//!
//! ## IGMP Message Types
//!
//! | Type | Value | Description |
//! |------|-------|-------------|
//! | Membership Query | 0x11 | General (group 0.0.0.0) or group-specific |
//! | V1 Membership Report | 0x12 | Host joined group (RFC 1112) |
//! | V2 Membership Report | 0x16 | Host joined group (RFC 2236) |
//! | Leave Group | 0x17 | Host left group (v2 only) |
//!
//! Every message is 8 bytes: type, max response time in tenths of a second,
//! checksum over all 8 bytes, group address.

use std::fmt;
use std::net::Ipv4Addr;

use super::PacketBuilder;
use crate::checksum;
use crate::error::{McastError, Result};

// IGMP message types
pub const IGMP_MEMBERSHIP_QUERY: u8 = 0x11;
pub const IGMP_V1_MEMBERSHIP_REPORT: u8 = 0x12;
pub const IGMP_V2_MEMBERSHIP_REPORT: u8 = 0x16;
pub const IGMP_LEAVE_GROUP: u8 = 0x17;

/// Length of a v1/v2 message
pub const IGMP_MESSAGE_LEN: usize = 8;

/// All hosts multicast address (224.0.0.1), destination of general queries
pub const ALL_HOSTS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// All IGMP routers address for Leave messages (224.0.0.2)
pub const ALL_ROUTERS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 2);

/// Largest max response time that fits the 8-bit field (25.5 s, whole seconds)
pub const MAX_RESPONSE_TIME_SECS: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgmpType {
    Query,
    V1Report,
    V2Report,
    Leave,
}

impl IgmpType {
    pub const fn as_u8(self) -> u8 {
        match self {
            IgmpType::Query => IGMP_MEMBERSHIP_QUERY,
            IgmpType::V1Report => IGMP_V1_MEMBERSHIP_REPORT,
            IgmpType::V2Report => IGMP_V2_MEMBERSHIP_REPORT,
            IgmpType::Leave => IGMP_LEAVE_GROUP,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            IgmpType::Query => "Membership Query",
            IgmpType::V1Report => "V1 Membership Report",
            IgmpType::V2Report => "V2 Membership Report",
            IgmpType::Leave => "Leave Group",
        }
    }
}

impl TryFrom<u8> for IgmpType {
    type Error = McastError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            IGMP_MEMBERSHIP_QUERY => Ok(IgmpType::Query),
            IGMP_V1_MEMBERSHIP_REPORT => Ok(IgmpType::V1Report),
            IGMP_V2_MEMBERSHIP_REPORT => Ok(IgmpType::V2Report),
            IGMP_LEAVE_GROUP => Ok(IgmpType::Leave),
            other => Err(McastError::UnsupportedOperation(format!(
                "IGMP message type 0x{:02x}",
                other
            ))),
        }
    }
}

impl fmt::Display for IgmpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// IGMP protocol version requested for joins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgmpVersion {
    V1,
    V2,
    V3,
}

impl IgmpVersion {
    /// Report type used to join a group with this version.
    ///
    /// IGMPv3 reports carry group records and are not built here.
    pub fn report_type(self) -> Result<IgmpType> {
        match self {
            IgmpVersion::V1 => Ok(IgmpType::V1Report),
            IgmpVersion::V2 => Ok(IgmpType::V2Report),
            IgmpVersion::V3 => Err(McastError::UnsupportedOperation(
                "IGMPv3 membership reports".to_string(),
            )),
        }
    }

    /// Leave type for this version; IGMPv1 hosts leave silently.
    pub fn leave_type(self) -> Result<IgmpType> {
        match self {
            IgmpVersion::V2 => Ok(IgmpType::Leave),
            IgmpVersion::V1 => Err(McastError::UnsupportedOperation(
                "IGMPv1 has no leave message".to_string(),
            )),
            IgmpVersion::V3 => Err(McastError::UnsupportedOperation(
                "IGMPv3 leave (state-change report)".to_string(),
            )),
        }
    }
}

impl TryFrom<u8> for IgmpVersion {
    type Error = McastError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(IgmpVersion::V1),
            2 => Ok(IgmpVersion::V2),
            3 => Ok(IgmpVersion::V3),
            other => Err(McastError::ConfigurationConflict(format!(
                "IGMP version must be 1, 2 or 3, got {}",
                other
            ))),
        }
    }
}

/// A v1/v2 IGMP message. The checksum is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgmpMessage {
    pub msg_type: IgmpType,
    /// Max response time in tenths of a second (queries only)
    pub max_resp_code: u8,
    pub group: Ipv4Addr,
}

impl IgmpMessage {
    pub fn new(msg_type: IgmpType, max_resp_code: u8, group: Ipv4Addr) -> Self {
        Self {
            msg_type,
            max_resp_code,
            group,
        }
    }

    /// Membership report for `group`
    pub fn report(version: IgmpVersion, group: Ipv4Addr) -> Result<Self> {
        Ok(Self::new(version.report_type()?, 0, group))
    }

    /// Leave Group for `group`
    pub fn leave(group: Ipv4Addr) -> Self {
        Self::new(IgmpType::Leave, 0, group)
    }

    /// General query when `group` is `None`, else group-specific
    pub fn query(max_resp_secs: u8, group: Option<Ipv4Addr>) -> Result<Self> {
        Ok(Self::new(
            IgmpType::Query,
            max_response_code(max_resp_secs)?,
            group.unwrap_or(Ipv4Addr::UNSPECIFIED),
        ))
    }

    pub fn is_general_query(&self) -> bool {
        self.msg_type == IgmpType::Query && self.group == Ipv4Addr::UNSPECIFIED
    }

    /// Wire form with the checksum filled in
    pub fn to_bytes(&self) -> [u8; IGMP_MESSAGE_LEN] {
        let mut packet = [0u8; IGMP_MESSAGE_LEN];
        packet[0] = self.msg_type.as_u8();
        packet[1] = self.max_resp_code;
        packet[4..8].copy_from_slice(&self.group.octets());
        let csum = checksum::checksum_bytes(&packet);
        packet[2..4].copy_from_slice(&csum);
        packet
    }

    /// Decode an 8-byte message, rejecting unknown types and bad checksums
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < IGMP_MESSAGE_LEN {
            return Err(McastError::UnsupportedOperation(format!(
                "IGMP message of {} bytes (need {})",
                data.len(),
                IGMP_MESSAGE_LEN
            )));
        }
        let data = &data[..IGMP_MESSAGE_LEN];
        if !checksum::is_valid(data) {
            return Err(McastError::UnsupportedOperation(format!(
                "IGMP message with bad checksum (0x{:02x}{:02x})",
                data[2], data[3]
            )));
        }
        Ok(Self {
            msg_type: IgmpType::try_from(data[0])?,
            max_resp_code: data[1],
            group: Ipv4Addr::new(data[4], data[5], data[6], data[7]),
        })
    }
}

impl PacketBuilder for IgmpMessage {
    fn build(&self) -> Vec<u8> {
        self.to_bytes().to_vec()
    }
}

/// Encode a max response time in seconds as tenths of a second
pub fn max_response_code(seconds: u8) -> Result<u8> {
    seconds.checked_mul(10).ok_or_else(|| {
        McastError::ConfigurationConflict(format!(
            "max response time {}s exceeds {}s",
            seconds, MAX_RESPONSE_TIME_SECS
        ))
    })
}

/// Lay out and checksum an IGMP message from its raw type byte.
///
/// Byte 1 carries `max_resp_secs` in tenths of a second.
pub fn build_igmp_message(
    msg_type: u8,
    max_resp_secs: u8,
    group: Ipv4Addr,
) -> Result<[u8; IGMP_MESSAGE_LEN]> {
    let msg_type = IgmpType::try_from(msg_type)?;
    Ok(IgmpMessage::new(msg_type, max_response_code(max_resp_secs)?, group).to_bytes())
}
