// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Multicast listeners.
//!
//! A [`MulticastListener`] owns one UDP socket bound to `address:port`,
//! joined to the group when `address` is multicast, with IP_PKTINFO and
//! IP_RECVTTL enabled so every datagram carries its destination and TTL.
//! A [`FanOutListener`] runs one listener per address of a range and merges
//! their events, in arrival order, into a single bounded channel. A listener
//! that fails reports [`ListenerEvent::Failed`] and stops; its siblings keep
//! running.

use std::borrow::Cow;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::unix::io::AsRawFd;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::address_range::AddressRange;
use crate::error::{McastError, Result};
use crate::interface::InterfaceHandle;
use crate::logging::{Facility, Logger, Severity};
use crate::shutdown::Shutdown;
use crate::socket_helpers::{self, RecvResult};
use crate::transport::Endpoint;
use crate::validation;

/// Largest UDP payload over IPv4
const RECV_BUFFER_LEN: usize = 65536;

/// One received datagram, copied out of the receive buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDatagram {
    pub payload: Vec<u8>,
    pub source: Endpoint,
    pub destination: Option<Ipv4Addr>,
    pub ttl: Option<u8>,
    pub interface_index: Option<u32>,
    /// Binding of the listener that received it
    pub listener: Endpoint,
}

impl InboundDatagram {
    /// `*Received <n> bytes on <dst> with ttl: <ttl> from <src>*`, or the
    /// short form when the control data is missing
    pub fn notice(&self) -> String {
        match (self.destination, self.ttl) {
            (Some(dst), Some(ttl)) => format!(
                "*Received {} bytes on {} with ttl: {} from {}*",
                self.payload.len(),
                dst,
                ttl,
                self.source
            ),
            _ => format!(
                "*Received {} bytes from {}*",
                self.payload.len(),
                self.source
            ),
        }
    }

    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Name of the arrival interface, when the kernel reported one
    pub fn interface_name(&self) -> Option<String> {
        self.interface_index
            .and_then(socket_helpers::interface_name_from_index)
    }
}

/// Events merged by a [`FanOutListener`]
#[derive(Debug)]
pub enum ListenerEvent {
    Datagram(InboundDatagram),
    /// The listener for `address` stopped with `error`
    Failed { address: Ipv4Addr, error: McastError },
}

impl fmt::Display for ListenerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerEvent::Datagram(datagram) => f.write_str(&datagram.notice()),
            ListenerEvent::Failed { address, error } => {
                write!(f, "listener {} failed: {}", address, error)
            }
        }
    }
}

/// One bound, optionally group-joined, receive socket
pub struct MulticastListener {
    binding: Endpoint,
    socket: AsyncFd<Socket>,
    buf: Vec<u8>,
    logger: Logger,
}

impl MulticastListener {
    /// Bind to `address:port`, joining the group on `interface` (or the
    /// kernel's choice) when `address` is multicast.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(
        address: Ipv4Addr,
        port: u16,
        interface: Option<&InterfaceHandle>,
        logger: Logger,
    ) -> Result<Self> {
        let binding = Endpoint::new(address, port);
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(McastError::socket("create UDP socket"))?;
        socket
            .set_reuse_address(true)
            .map_err(McastError::socket("set SO_REUSEADDR"))?;
        socket
            .set_reuse_port(true)
            .map_err(McastError::socket("set SO_REUSEPORT"))?;
        socket
            .bind(&SockAddr::from(SocketAddrV4::new(address, port)))
            .map_err(McastError::socket(format!("bind to {}", binding)))?;

        if address.is_multicast() {
            let index = interface.map(|i| i.index).unwrap_or(0);
            socket_helpers::join_multicast_group(socket.as_raw_fd(), address, index)?;
        }
        socket_helpers::set_ip_pktinfo(socket.as_raw_fd())?;
        socket_helpers::set_ip_recvttl(socket.as_raw_fd())?;
        socket
            .set_nonblocking(true)
            .map_err(McastError::socket("set socket non-blocking"))?;
        let socket = AsyncFd::new(socket).map_err(McastError::socket("register socket"))?;

        logger.info(
            Facility::Listener,
            &format!(
                "listening on {} interface: {}",
                binding,
                interface.map(|i| i.name.as_str()).unwrap_or("any")
            ),
        );

        Ok(Self {
            binding,
            socket,
            buf: vec![0u8; RECV_BUFFER_LEN],
            logger,
        })
    }

    pub fn binding(&self) -> Endpoint {
        self.binding
    }

    /// Actual bound endpoint (resolves port 0)
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        let addr = self
            .socket
            .get_ref()
            .local_addr()
            .map_err(McastError::socket("read local address"))?;
        addr.as_socket_ipv4()
            .map(Endpoint::from)
            .ok_or_else(|| {
                McastError::unresolved(self.binding.to_string(), "not an IPv4 socket")
            })
    }

    /// Wait for the next datagram
    pub async fn recv(&mut self) -> Result<InboundDatagram> {
        loop {
            let mut guard = self
                .socket
                .readable()
                .await
                .map_err(McastError::socket(format!("wait on {}", self.binding)))?;
            let buf = &mut self.buf;
            let read = guard.try_io(|inner| socket_helpers::recv_with_control(inner.as_raw_fd(), buf));
            match read {
                Ok(Ok(received)) => return Ok(self.decode(received)),
                Ok(Err(e)) => {
                    return Err(McastError::Socket {
                        context: format!("read on {}", self.binding),
                        source: e,
                    })
                }
                Err(_would_block) => continue,
            }
        }
    }

    fn decode(&self, received: RecvResult) -> InboundDatagram {
        let source = received
            .source
            .map(Endpoint::from)
            .unwrap_or(Endpoint::new(Ipv4Addr::UNSPECIFIED, 0));
        let datagram = InboundDatagram {
            payload: self.buf[..received.len].to_vec(),
            source,
            destination: received.control.destination,
            ttl: received.control.ttl,
            interface_index: received.control.interface_index,
            listener: self.binding,
        };
        if self.logger.enabled(Severity::Debug, Facility::Listener) {
            let interface = datagram.interface_name();
            log_kv!(
                self.logger,
                Severity::Debug,
                Facility::Listener,
                "datagram",
                "bytes" => &received.len.to_string(),
                "source" => &source.to_string(),
                "listener" => &self.binding.to_string(),
                "interface" => interface.as_deref().unwrap_or("?")
            );
        }
        datagram
    }

    /// Publish datagrams to `events` until shutdown, a read error, or the
    /// receiver side of the channel is dropped.
    pub async fn run(mut self, events: mpsc::Sender<ListenerEvent>, mut shutdown: Shutdown) {
        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                received = self.recv() => received,
            };
            match received {
                Ok(datagram) => {
                    // Bounded channel: block rather than drop under bursts
                    if events.send(ListenerEvent::Datagram(datagram)).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    log_error!(
                        self.logger,
                        Facility::Listener,
                        "{} stopped: {}",
                        self.binding,
                        error
                    );
                    let _ = events
                        .send(ListenerEvent::Failed {
                            address: self.binding.address,
                            error,
                        })
                        .await;
                    break;
                }
            }
        }
    }
}

impl fmt::Debug for MulticastListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastListener")
            .field("binding", &self.binding)
            .finish()
    }
}

/// Settings shared by every listener of a fan-out
#[derive(Debug, Clone)]
pub struct FanOutListener {
    port: u16,
    interface: Option<InterfaceHandle>,
    max_listeners: u64,
    channel_capacity: usize,
    logger: Logger,
}

/// Running listeners and their merged event stream.
///
/// Dropping it aborts every listener.
pub struct ListenerSet {
    events: mpsc::Receiver<ListenerEvent>,
    tasks: JoinSet<()>,
    listeners: u64,
}

impl ListenerSet {
    /// Next event in arrival order; `None` once every listener has stopped
    pub async fn next_event(&mut self) -> Option<ListenerEvent> {
        self.events.recv().await
    }

    pub fn listener_count(&self) -> u64 {
        self.listeners
    }

    /// Wait for every listener task to end
    pub async fn join(mut self) {
        self.events.close();
        while self.tasks.join_next().await.is_some() {}
    }
}

impl FanOutListener {
    pub fn new(
        port: u16,
        interface: Option<InterfaceHandle>,
        max_listeners: u64,
        channel_capacity: usize,
        logger: Logger,
    ) -> Self {
        Self {
            port,
            interface,
            max_listeners,
            channel_capacity,
            logger,
        }
    }

    /// Start one listener per address of `range`.
    ///
    /// Fails before opening any socket when the range is wider than
    /// `max_listeners`. Per-address bind failures arrive as
    /// [`ListenerEvent::Failed`]. Must be called from within a tokio runtime.
    pub fn listen(&self, range: &AddressRange, shutdown: Shutdown) -> Result<ListenerSet> {
        validation::validate_fan_out_width(range.len(), self.max_listeners, &range.to_string())
            .map_err(McastError::ConfigurationConflict)?;
        if self.channel_capacity == 0 {
            return Err(McastError::ConfigurationConflict(
                "listener channel capacity must be at least 1".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let mut tasks = JoinSet::new();

        for address in range.iter() {
            let tx = tx.clone();
            let shutdown = shutdown.clone();
            let logger = self.logger.clone();
            let interface = self.interface.clone();
            let port = self.port;
            tasks.spawn(async move {
                match MulticastListener::bind(address, port, interface.as_ref(), logger.clone()) {
                    Ok(listener) => listener.run(tx, shutdown).await,
                    Err(error) => {
                        log_warning!(
                            logger,
                            Facility::Listener,
                            "{} not bound: {}",
                            address,
                            error
                        );
                        let _ = tx.send(ListenerEvent::Failed { address, error }).await;
                    }
                }
            });
        }

        Ok(ListenerSet {
            events: rx,
            tasks,
            listeners: range.len(),
        })
    }
}
