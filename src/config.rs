// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Defaults file for the mcast tool.
//!
//! JSON5 format with one section per subcommand plus fan-out limits. Every
//! field is optional; command-line flags override whatever the file sets.
//!
//! ```json5
//! {
//!     // send to a whole /28 at once
//!     send: { group: "239.1.1.0/28", ttl: 4, interval_ms: 250 },
//!     limits: { max_send_concurrency: 64 },
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::address_range::AddressRange;
use crate::protocols::igmp::MAX_RESPONSE_TIME_SECS;
use crate::validation;

pub const DEFAULT_GROUP: &str = "239.1.1.50";
pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_TEXT: &str = "This is test number: {c}";

/// Complete configuration (JSON5 file format)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct McastConfig {
    pub send: SendSettings,
    pub receive: ReceiveSettings,
    pub join: JoinSettings,
    pub leave: LeaveSettings,
    pub query: QuerySettings,
    pub limits: Limits,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SendSettings {
    /// Single address or CIDR block
    pub group: String,
    pub port: u16,
    pub ttl: u8,
    pub tos: u8,
    /// `{c}` is replaced with the counter
    pub text: String,
    pub padding: usize,
    pub interval_ms: u64,
    pub start_value: u64,
    /// 0 = unbounded
    pub max: u64,
    /// `host:port` to send from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    /// Outgoing interface for multicast
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            port: DEFAULT_PORT,
            ttl: 50,
            tos: 0,
            text: DEFAULT_TEXT.to_string(),
            padding: 0,
            interval_ms: 1000,
            start_value: 1,
            max: 0,
            local_address: None,
            interface: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReceiveSettings {
    pub group: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Print payloads after each notice
    pub show: bool,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            port: DEFAULT_PORT,
            interface: None,
            show: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JoinSettings {
    pub group: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Hand-built IGMP reports instead of the kernel join
    pub raw: bool,
    pub interval_ms: u64,
    pub router_alert: bool,
    pub igmp_version: u8,
}

impl Default for JoinSettings {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            port: DEFAULT_PORT,
            interface: None,
            raw: false,
            interval_ms: 10_000,
            router_alert: false,
            igmp_version: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LeaveSettings {
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub interval_ms: u64,
    pub max: u64,
    pub router_alert: bool,
}

impl Default for LeaveSettings {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            interface: None,
            interval_ms: 5,
            max: 1,
            router_alert: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuerySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    pub interval_secs: u64,
    pub max_response_time_secs: u8,
    pub max: u64,
    /// Group-specific query target; general query when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Ipv4Addr>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            interface: None,
            interval_secs: 5,
            max_response_time_secs: 10,
            max: 0,
            group: None,
        }
    }
}

/// The settings one subcommand runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Send,
    Receive,
    Join,
    Leave,
    Query,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Send,
        Section::Receive,
        Section::Join,
        Section::Leave,
        Section::Query,
    ];
}

/// Fan-out bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    /// Simultaneous per-address senders
    pub max_send_concurrency: usize,
    /// Widest receive fan-out accepted
    pub max_listeners: u64,
    /// Merged listener event buffer
    pub channel_capacity: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_send_concurrency: 256,
            max_listeners: 4096,
            channel_capacity: 1000,
        }
    }
}

impl McastConfig {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    ///
    /// Goes through `serde_json::Value`: json5 clamps integers that overflow
    /// their field, serde_json rejects them (`ttl: 300` is a parse error).
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value =
            json5::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate the settings `section` runs with, plus the shared limits.
    /// Other sections are not checked.
    pub fn validate(&self, section: Section) -> Result<(), ConfigError> {
        match section {
            Section::Send => {
                let send = &self.send;
                validate_group(&send.group, "send.group")?;
                validate_port(send.port, "send.port")?;
                validate_interface(send.interface.as_deref())?;
                if let Some(local) = &send.local_address {
                    validation::validate_local_address(local).map_err(|reason| {
                        ConfigError::InvalidValue {
                            field: "send.local_address",
                            reason,
                        }
                    })?;
                }
            }
            Section::Receive => {
                validate_group(&self.receive.group, "receive.group")?;
                validate_port(self.receive.port, "receive.port")?;
                validate_interface(self.receive.interface.as_deref())?;
            }
            Section::Join => {
                let join = &self.join;
                validate_group(&join.group, "join.group")?;
                validate_port(join.port, "join.port")?;
                validate_interface(join.interface.as_deref())?;
                if !(1..=3).contains(&join.igmp_version) {
                    return Err(ConfigError::InvalidValue {
                        field: "join.igmp_version",
                        reason: format!("must be 1, 2 or 3, got {}", join.igmp_version),
                    });
                }
            }
            Section::Leave => {
                validate_group(&self.leave.group, "leave.group")?;
                validate_interface(self.leave.interface.as_deref())?;
            }
            Section::Query => {
                validate_interface(self.query.interface.as_deref())?;
                if self.query.max_response_time_secs > MAX_RESPONSE_TIME_SECS {
                    return Err(ConfigError::InvalidValue {
                        field: "query.max_response_time_secs",
                        reason: format!(
                            "{} exceeds the {}s the IGMP field can carry",
                            self.query.max_response_time_secs, MAX_RESPONSE_TIME_SECS
                        ),
                    });
                }
            }
        }

        for (value, field) in [
            (self.limits.max_send_concurrency as u64, "limits.max_send_concurrency"),
            (self.limits.max_listeners, "limits.max_listeners"),
            (self.limits.channel_capacity as u64, "limits.channel_capacity"),
        ] {
            validation::validate_nonzero(value, field)
                .map_err(|reason| ConfigError::InvalidValue { field, reason })?;
        }

        Ok(())
    }
}

fn validate_port(port: u16, context: &str) -> Result<(), ConfigError> {
    validation::validate_port(port, context)
        .map_err(|reason| ConfigError::InvalidPort { port, reason })
}

fn validate_interface(name: Option<&str>) -> Result<(), ConfigError> {
    match name {
        Some(name) => validation::validate_interface_name(name).map_err(|reason| {
            ConfigError::InvalidInterfaceName {
                name: name.to_string(),
                reason,
            }
        }),
        None => Ok(()),
    }
}

fn validate_group(group: &str, field: &'static str) -> Result<(), ConfigError> {
    AddressRange::parse(group)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidGroup {
            field,
            value: group.to_string(),
            reason: e.to_string(),
        })
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    IoError(std::path::PathBuf, String),
    ParseError(String),
    InvalidGroup {
        field: &'static str,
        value: String,
        reason: String,
    },
    InvalidInterfaceName {
        name: String,
        reason: String,
    },
    InvalidPort {
        port: u16,
        reason: String,
    },
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, msg) => {
                write!(
                    f,
                    "failed to read config file '{}': {}",
                    path.display(),
                    msg
                )
            }
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::InvalidGroup {
                field,
                value,
                reason,
            } => write!(f, "invalid {} '{}': {}", field, value, reason),
            ConfigError::InvalidInterfaceName { name, reason } => {
                write!(f, "invalid interface name '{}': {}", name, reason)
            }
            ConfigError::InvalidPort { port, reason } => {
                write!(f, "invalid port {}: {}", port, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
