// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Multicast and IGMP traffic generation for network testing.
//!
//! A single address or a CIDR block is expanded into an [`AddressRange`];
//! [`FanOutSender`] and [`FanOutListener`] then run one independent
//! transport or listener per address. The raw IGMP operations in
//! [`membership`] hand-build reports, leaves and queries.

#[macro_use]
pub mod logging;

pub mod address_range;
pub mod checksum;
pub mod config;
pub mod error;
pub mod fanout;
pub mod interface;
pub mod membership;
pub mod protocols;
pub mod receiver;
pub mod scheduler;
pub mod shutdown;
pub mod socket_helpers;
pub mod transport;
pub mod validation;

pub use address_range::AddressRange;
pub use config::{ConfigError, McastConfig};
pub use error::{McastError, Result};
pub use fanout::{AddressFailure, FanOutReport, FanOutSender};
pub use interface::InterfaceHandle;
pub use receiver::{
    FanOutListener, InboundDatagram, ListenerEvent, ListenerSet, MulticastListener,
};
pub use scheduler::{MessageTemplate, SendOutcome, SendSchedule};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use transport::{DatagramSink, Endpoint, PacketTransport, ProtocolMode, TransportConfig};
