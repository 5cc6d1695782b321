// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging facilities (component identifiers)

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Logging facility - identifies which component generated the log message
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facility {
    /// Command-line front end
    Cli = 0,
    /// Configuration file loading and validation
    Config = 1,
    /// UDP and raw IP sockets owned by a PacketTransport
    Transport = 2,
    /// Repeated send loop
    Scheduler = 3,
    /// Per-address worker spawning and the aggregate report
    FanOut = 4,
    /// Receiving sockets and the merged event stream
    Listener = 5,
    /// IGMP message construction, raw join/leave/query
    Igmp = 6,
    /// Interface lookup, socket options
    Network = 7,
    /// Test harness
    Test = 8,
}

impl Facility {
    pub const ALL: [Facility; 9] = [
        Facility::Cli,
        Facility::Config,
        Facility::Transport,
        Facility::Scheduler,
        Facility::FanOut,
        Facility::Listener,
        Facility::Igmp,
        Facility::Network,
        Facility::Test,
    ];

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Facility::Cli => "Cli",
            Facility::Config => "Config",
            Facility::Transport => "Transport",
            Facility::Scheduler => "Scheduler",
            Facility::FanOut => "FanOut",
            Facility::Listener => "Listener",
            Facility::Igmp => "Igmp",
            Facility::Network => "Network",
            Facility::Test => "Test",
        }
    }
}

impl std::fmt::Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Facility {
    type Err = String;

    /// Facility names in any case (`fanout`, `FanOut`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Facility::ALL
            .into_iter()
            .find(|facility| facility.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown facility '{}'", s))
    }
}
