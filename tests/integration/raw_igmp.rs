// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Raw IGMP operations over loopback.
//!
//! Requires CAP_NET_RAW: `sudo -E cargo test --test integration -- --ignored`

use std::io::Read;
use std::net::Ipv4Addr;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use mcast::interface;
use mcast::logging::Logger;
use mcast::membership::{self, QueryOptions, RawMembershipOptions};
use mcast::protocols::igmp::{IgmpMessage, IgmpType, IgmpVersion};
use mcast::{AddressRange, Shutdown};
use mcast_test_macros::requires_root;
use socket2::{Domain, Protocol, Socket, Type};

const IPPROTO_IGMP: u8 = 2;

fn options(max_count: u64) -> RawMembershipOptions {
    RawMembershipOptions {
        interface: Some(interface::lookup("lo").unwrap()),
        router_alert: true,
        interval: Duration::from_millis(5),
        max_count,
        max_concurrency: 4,
    }
}

/// Packet socket on lo delivering whole IPv4 packets.
///
/// A raw IGMP socket only sees looped-back multicast for groups the host
/// has joined, so reports to arbitrary groups and leaves to 224.0.0.2 are
/// captured below IP instead.
fn capture() -> Socket {
    let eth_p_ip = (libc::ETH_P_IP as u16).to_be();
    let socket = Socket::new(
        Domain::PACKET,
        Type::DGRAM,
        Some(Protocol::from(eth_p_ip as libc::c_int)),
    )
    .unwrap();

    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = eth_p_ip;
    addr.sll_ifindex = interface::lookup("lo").unwrap().index as libc::c_int;
    let rc = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    assert_eq!(rc, 0, "bind to lo: {}", std::io::Error::last_os_error());

    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    socket
}

/// Drain the capture socket, decoding every IGMP message seen
fn captured(socket: &Socket) -> Vec<IgmpMessage> {
    let mut messages = Vec::new();
    let mut buf = [0u8; 1500];
    let mut socket = socket;
    while let Ok(len) = socket.read(&mut buf) {
        if len < 20 || buf[9] != IPPROTO_IGMP {
            continue;
        }
        let header_len = ((buf[0] & 0x0f) as usize) * 4;
        if let Ok(message) = IgmpMessage::parse(&buf[header_len..len]) {
            messages.push(message);
        }
    }
    messages
}

#[tokio::test]
#[ignore]
#[requires_root]
async fn test_raw_join_reports_every_group() {
    let capture = capture();
    let range = AddressRange::parse("239.255.10.0/30").unwrap();

    let report = membership::join_raw(
        &range,
        IgmpVersion::V2,
        &options(1),
        Shutdown::never(),
        &Logger::quiet(),
    )
    .await
    .unwrap();
    assert_eq!(report.succeeded, 4, "{:?}", report.failures);

    let reports: Vec<Ipv4Addr> = captured(&capture)
        .into_iter()
        .filter(|m| m.msg_type == IgmpType::V2Report)
        .map(|m| m.group)
        .collect();
    for group in &range {
        assert!(reports.contains(&group), "no report for {}", group);
    }
}

#[tokio::test]
#[ignore]
#[requires_root]
async fn test_raw_leave_goes_to_all_routers() {
    let capture = capture();
    let range = AddressRange::parse("239.255.11.1").unwrap();

    let report = membership::leave_raw(
        &range,
        IgmpVersion::V2,
        &options(2),
        Shutdown::never(),
        &Logger::quiet(),
    )
    .await
    .unwrap();
    assert!(report.all_succeeded());

    let leaves = captured(&capture)
        .into_iter()
        .filter(|m| m.msg_type == IgmpType::Leave && m.group == range.first())
        .count();
    assert!(leaves >= 2, "captured {} leaves", leaves);
}

#[tokio::test]
#[ignore]
#[requires_root]
async fn test_general_query() {
    let capture = capture();
    let request = QueryOptions {
        group: None,
        max_response_time_secs: 10,
        play_nice: false,
    };

    let outcome = membership::query(&request, &options(1), Shutdown::never(), &Logger::quiet())
        .await
        .unwrap();
    assert_eq!(outcome.sent, 1);

    let queries: Vec<IgmpMessage> = captured(&capture)
        .into_iter()
        .filter(|m| m.msg_type == IgmpType::Query)
        .collect();
    assert!(queries
        .iter()
        .any(|q| q.is_general_query() && q.max_resp_code == 100));
}
