// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Dual-mode packet transport.
//!
//! A [`PacketTransport`] owns exactly one socket for one destination. In UDP
//! mode it writes payloads through a connected datagram socket; in raw mode
//! it prepends a hand-built IPv4 header (optionally with Router Alert) and
//! writes the whole datagram through an `IP_HDRINCL` socket.
//!
//! ```text
//! Unconnected --connect/first send--> Udp | Raw --close--> Closed
//! ```

use std::fmt;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::os::unix::io::AsRawFd;

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::net::UdpSocket;

use crate::error::{McastError, Result};
use crate::interface::InterfaceHandle;
use crate::logging::{Facility, Logger};
use crate::protocols::ip::{build_ip_packet, Ipv4Header, IPPROTO_IGMP};
use crate::socket_helpers;
use crate::validation;

/// Default multicast TTL for UDP sends
pub const DEFAULT_TTL: u8 = 50;

/// An IPv4 address and port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub const fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }

    /// Parse a local `host:port` endpoint.
    ///
    /// A missing `:` separator is a `ConfigurationConflict`; a host that does
    /// not resolve to an IPv4 address is an `AddressResolution` failure.
    pub fn parse_local(local: &str) -> Result<Self> {
        let (host, port) = local.rsplit_once(':').ok_or_else(|| {
            McastError::ConfigurationConflict(format!(
                "local address '{}' must include an explicit port (host:port)",
                local
            ))
        })?;
        let port: u16 = port.parse().map_err(|_| {
            McastError::ConfigurationConflict(format!("invalid port '{}' in '{}'", port, local))
        })?;
        Self::resolve(host, port)
    }

    /// Resolve `host` (literal or name) to its first IPv4 address
    pub fn resolve(host: &str, port: u16) -> Result<Self> {
        if let Ok(address) = host.parse::<Ipv4Addr>() {
            return Ok(Self::new(address, port));
        }
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| McastError::AddressResolution {
                address: host.to_string(),
                source,
            })?;
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(Self::new(*v4.ip(), v4.port())),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| McastError::unresolved(host, "no IPv4 address"))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolMode {
    #[default]
    Udp,
    /// Hand-built IPv4 header carrying an IGMP payload
    RawIp,
}

/// Per-transport settings, fixed before the first send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub ttl: u8,
    pub tos: u8,
    /// Pad every payload with zeros up to this length (0 = no padding)
    pub padding_length: usize,
    pub local_endpoint: Option<Endpoint>,
    pub protocol_mode: ProtocolMode,
    /// Raw mode only
    pub router_alert: bool,
    /// Outgoing interface for multicast; also the raw source address
    pub interface: Option<InterfaceHandle>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            tos: 0,
            padding_length: 0,
            local_endpoint: None,
            protocol_mode: ProtocolMode::Udp,
            router_alert: false,
            interface: None,
        }
    }
}

impl TransportConfig {
    /// Check a payload length against the padding policy.
    ///
    /// Padding shorter than the message is rejected rather than truncated.
    pub fn check_padding(&self, payload_len: usize) -> Result<()> {
        validation::validate_padding(self.padding_length, payload_len)
            .map_err(McastError::ConfigurationConflict)
    }

    /// The bytes actually written for `payload`: the message, then zeros up
    /// to `padding_length`.
    pub fn pad(&self, payload: &[u8]) -> Result<Vec<u8>> {
        self.check_padding(payload.len())?;
        let mut padded = payload.to_vec();
        if self.padding_length > payload.len() {
            padded.resize(self.padding_length, 0);
        }
        Ok(padded)
    }

    /// Source address for raw headers; 0.0.0.0 lets the kernel fill it in
    fn raw_source(&self) -> Ipv4Addr {
        self.local_endpoint
            .map(|e| e.address)
            .or_else(|| self.interface.as_ref().and_then(|i| i.ipv4))
            .unwrap_or(Ipv4Addr::UNSPECIFIED)
    }
}

/// Anything a scheduler can push datagrams into
pub trait DatagramSink: Send {
    /// Write one payload; returns the bytes put on the wire
    fn send_datagram(&mut self, payload: &[u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Release the underlying resources; idempotent
    fn close(&mut self);
}

enum State {
    Unconnected,
    Udp(UdpSocket),
    Raw(AsyncFd<Socket>),
    Closed,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Unconnected => "unconnected",
            State::Udp(_) => "udp",
            State::Raw(_) => "raw",
            State::Closed => "closed",
        }
    }
}

/// One socket, one destination
pub struct PacketTransport {
    destination: Endpoint,
    config: TransportConfig,
    state: State,
    logger: Logger,
}

impl PacketTransport {
    pub fn new(destination: Endpoint, config: TransportConfig, logger: Logger) -> Self {
        Self {
            destination,
            config,
            state: State::Unconnected,
            logger,
        }
    }

    pub fn destination(&self) -> Endpoint {
        self.destination
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Udp(_) | State::Raw(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Local address of a connected UDP transport
    pub fn local_endpoint(&self) -> Option<Endpoint> {
        match &self.state {
            State::Udp(socket) => match socket.local_addr() {
                Ok(SocketAddr::V4(addr)) => Some(addr.into()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Open the socket for the configured mode. No-op when already connected.
    pub async fn connect(&mut self) -> Result<()> {
        match self.state {
            State::Udp(_) | State::Raw(_) => return Ok(()),
            State::Closed => return Err(closed_error()),
            State::Unconnected => {}
        }
        self.state = match self.config.protocol_mode {
            ProtocolMode::Udp => State::Udp(self.connect_udp().await?),
            ProtocolMode::RawIp => State::Raw(self.connect_raw()?),
        };
        self.logger.debug(
            Facility::Transport,
            &format!(
                "{} transport connected to {}",
                self.state.name(),
                self.destination
            ),
        );
        Ok(())
    }

    async fn connect_udp(&self) -> Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(McastError::socket("create UDP socket"))?;
        socket
            .set_reuse_address(true)
            .map_err(McastError::socket("set SO_REUSEADDR"))?;

        let local = self
            .config
            .local_endpoint
            .unwrap_or(Endpoint::new(Ipv4Addr::UNSPECIFIED, 0));
        socket
            .bind(&SockAddr::from(local.socket_addr()))
            .map_err(McastError::socket(format!("bind UDP socket to {}", local)))?;

        if let Some(iface) = &self.config.interface {
            socket_helpers::set_multicast_if_index(socket.as_raw_fd(), iface.index)?;
        }
        socket_helpers::set_ip_pktinfo(socket.as_raw_fd())?;
        socket
            .set_nonblocking(true)
            .map_err(McastError::socket("set UDP socket non-blocking"))?;

        let socket = UdpSocket::from_std(socket.into())
            .map_err(McastError::socket("register UDP socket"))?;
        socket
            .connect(self.destination.socket_addr())
            .await
            .map_err(McastError::socket(format!("connect to {}", self.destination)))?;
        Ok(socket)
    }

    fn connect_raw(&self) -> Result<AsyncFd<Socket>> {
        let socket = Socket::new(
            Domain::IPV4,
            Type::RAW,
            Some(Protocol::from(IPPROTO_IGMP as i32)),
        )
        .map_err(McastError::socket("create raw IGMP socket"))?;
        socket_helpers::set_ip_hdrincl(socket.as_raw_fd())?;
        if let Some(iface) = &self.config.interface {
            socket_helpers::set_multicast_if_index(socket.as_raw_fd(), iface.index)?;
        }
        socket
            .set_nonblocking(true)
            .map_err(McastError::socket("set raw socket non-blocking"))?;
        AsyncFd::new(socket).map_err(McastError::socket("register raw socket"))
    }

    /// Send one payload, connecting first if needed
    pub async fn send(&mut self, payload: &[u8]) -> Result<usize> {
        if self.config.protocol_mode == ProtocolMode::Udp {
            self.config.check_padding(payload.len())?;
        }
        if matches!(self.state, State::Unconnected) {
            self.connect().await?;
        }
        let destination = self.destination;
        match &self.state {
            State::Udp(socket) => {
                let padded = self.config.pad(payload)?;
                let sock = SockRef::from(socket);
                sock.set_ttl(self.config.ttl as u32)
                    .map_err(McastError::socket("set IP_TTL"))?;
                sock.set_multicast_ttl_v4(self.config.ttl as u32)
                    .map_err(McastError::socket("set IP_MULTICAST_TTL"))?;
                sock.set_tos(self.config.tos as u32)
                    .map_err(McastError::socket("set IP_TOS"))?;
                socket
                    .send(&padded)
                    .await
                    .map_err(McastError::socket(format!("send to {}", destination)))
            }
            State::Raw(socket) => {
                let header = Ipv4Header {
                    source: self.config.raw_source(),
                    destination: destination.address,
                    ttl: self.config.ttl,
                    tos: self.config.tos,
                    protocol: IPPROTO_IGMP,
                    router_alert: self.config.router_alert,
                };
                let packet = build_ip_packet(&header, payload);
                send_raw(socket, &packet, destination.address)
                    .await
                    .map_err(McastError::socket(format!(
                        "raw send to {}",
                        destination.address
                    )))
            }
            State::Closed => Err(closed_error()),
            State::Unconnected => Err(McastError::Socket {
                context: format!("send to {}", destination),
                source: std::io::Error::from(std::io::ErrorKind::NotConnected),
            }),
        }
    }

    /// Release the socket. Safe to call repeatedly or before connecting.
    pub fn close(&mut self) {
        if self.is_connected() {
            self.logger.debug(
                Facility::Transport,
                &format!("closing transport to {}", self.destination),
            );
        }
        self.state = State::Closed;
    }
}

impl DatagramSink for PacketTransport {
    async fn send_datagram(&mut self, payload: &[u8]) -> Result<usize> {
        self.send(payload).await
    }

    fn close(&mut self) {
        PacketTransport::close(self);
    }
}

impl fmt::Debug for PacketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketTransport")
            .field("destination", &self.destination)
            .field("mode", &self.config.protocol_mode)
            .field("state", &self.state.name())
            .finish()
    }
}

async fn send_raw(
    socket: &AsyncFd<Socket>,
    packet: &[u8],
    dest: Ipv4Addr,
) -> std::io::Result<usize> {
    let addr = SockAddr::from(SocketAddrV4::new(dest, 0));
    loop {
        let mut guard = socket.writable().await?;
        match guard.try_io(|inner| inner.get_ref().send_to(packet, &addr)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

fn closed_error() -> McastError {
    McastError::Socket {
        context: "transport is closed".to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotConnected),
    }
}
