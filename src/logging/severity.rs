// SPDX-License-Identifier: Apache-2.0 OR MIT
// Severity levels for logging (RFC 5424 syslog-style)

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Log severity levels (0-7, lower is more severe)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Process cannot continue
    Emergency = 0,
    /// Lost a capability the whole run depends on (raw sockets)
    Alert = 1,
    /// Whole operation failed
    Critical = 2,
    /// One worker or listener failed
    Error = 3,
    /// Per-address failure isolated by a fan-out
    Warning = 4,
    /// Operation started or finished
    Notice = 5,
    /// Socket bound, group joined, summary counts
    Info = 6,
    /// Every send and every datagram
    Debug = 7,
}

impl Severity {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }

    /// Create from u8 value (returns None if invalid)
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Severity::Emergency),
            1 => Some(Severity::Alert),
            2 => Some(Severity::Critical),
            3 => Some(Severity::Error),
            4 => Some(Severity::Warning),
            5 => Some(Severity::Notice),
            6 => Some(Severity::Info),
            7 => Some(Severity::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Accepts level names in any case plus the usual short forms
    /// (`warn`, `err`, `crit`) and numeric levels `0`-`7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(level) = s.parse::<u8>() {
            return Severity::from_u8(level)
                .ok_or_else(|| format!("severity level {} is outside 0-7", level));
        }
        match s.to_ascii_lowercase().as_str() {
            "emergency" | "emerg" => Ok(Severity::Emergency),
            "alert" => Ok(Severity::Alert),
            "critical" | "crit" => Ok(Severity::Critical),
            "error" | "err" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "notice" => Ok(Severity::Notice),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}
