// SPDX-License-Identifier: Apache-2.0 OR MIT
// Integration test utilities

use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use mcast::{AddressRange, ListenerEvent, ListenerSet};

/// Port that was free a moment ago on 127.0.0.1
pub fn free_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .and_then(|socket| socket.local_addr())
        .map(|addr| addr.port())
        .expect("no free UDP port on loopback")
}

/// Plain sockets bound on `port` at every address of `range`.
///
/// Unicast sends to a port nobody holds fail with ECONNREFUSED once the
/// ICMP port-unreachable comes back, so senders that must keep running
/// need something on the other end.
pub fn bind_receivers(range: &AddressRange, port: u16) -> Vec<UdpSocket> {
    range
        .iter()
        .map(|address: Ipv4Addr| {
            UdpSocket::bind((address, port))
                .unwrap_or_else(|e| panic!("bind {}:{}: {}", address, port, e))
        })
        .collect()
}

/// Collect up to `count` events, giving up after `timeout` of silence
pub async fn collect_events(
    listeners: &mut ListenerSet,
    count: usize,
    timeout: Duration,
) -> Vec<ListenerEvent> {
    let mut events = Vec::with_capacity(count);
    while events.len() < count {
        match tokio::time::timeout(timeout, listeners.next_event()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) | Err(_) => break,
        }
    }
    events
}
