// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Sender and listener fan-out over loopback.
//!
//! Every address of 127.0.0.0/8 is local on Linux, so a /30 of loopback
//! addresses exercises the per-address transports and listeners without
//! multicast routing or privileges.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use mcast::logging::Logger;
use mcast::{
    shutdown_channel, AddressRange, FanOutListener, FanOutSender, ListenerEvent, MessageTemplate,
    SendSchedule, Shutdown, TransportConfig,
};

use crate::common::{bind_receivers, collect_events, free_port};

const BLOCK: &str = "127.0.0.4/30";

/// Give the listener tasks time to bind before anything is sent
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_every_address_receives_every_message() {
    let port = free_port();
    let range = AddressRange::parse(BLOCK).unwrap();
    let (trigger, shutdown) = shutdown_channel();

    let listener = FanOutListener::new(port, None, 16, 64, Logger::quiet());
    let mut listeners = listener.listen(&range, shutdown.clone()).unwrap();
    assert_eq!(listeners.listener_count(), 4);
    settle().await;

    let sender = FanOutSender::new(port, TransportConfig::default(), 2, Logger::quiet());
    let report = sender
        .start(
            &range,
            MessageTemplate::text("probe {c}"),
            SendSchedule::new(Duration::from_millis(10), 1, 3),
            Shutdown::never(),
        )
        .await
        .unwrap();
    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 4);
    assert!(report.all_succeeded());

    let events = collect_events(&mut listeners, 12, Duration::from_secs(2)).await;
    assert_eq!(events.len(), 12);

    let mut per_address: HashMap<Ipv4Addr, Vec<String>> = HashMap::new();
    for event in events {
        match event {
            ListenerEvent::Datagram(datagram) => {
                assert_eq!(datagram.ttl, Some(50));
                assert_eq!(datagram.destination, Some(datagram.listener.address));
                assert!(datagram.notice().starts_with("*Received 7 bytes on 127.0.0."));
                per_address
                    .entry(datagram.listener.address)
                    .or_default()
                    .push(datagram.payload_text().into_owned());
            }
            other => panic!("unexpected event: {}", other),
        }
    }

    for address in &range {
        let mut payloads = per_address.remove(&address).unwrap_or_default();
        payloads.sort();
        assert_eq!(payloads, ["probe 1", "probe 2", "probe 3"], "{}", address);
    }

    trigger.trigger();
    listeners.join().await;
}

#[tokio::test]
async fn test_padding_reaches_the_wire() {
    let port = free_port();
    let range = AddressRange::parse("127.0.0.9").unwrap();
    let (trigger, shutdown) = shutdown_channel();

    let listener = FanOutListener::new(port, None, 1, 8, Logger::quiet());
    let mut listeners = listener.listen(&range, shutdown).unwrap();
    settle().await;

    let config = TransportConfig {
        padding_length: 64,
        ttl: 3,
        ..TransportConfig::default()
    };
    let sender = FanOutSender::new(port, config, 1, Logger::quiet());
    sender
        .start(
            &range,
            MessageTemplate::text("short"),
            SendSchedule::once(),
            Shutdown::never(),
        )
        .await
        .unwrap();

    let events = collect_events(&mut listeners, 1, Duration::from_secs(2)).await;
    match events.as_slice() {
        [ListenerEvent::Datagram(datagram)] => {
            assert_eq!(datagram.payload.len(), 64);
            assert!(datagram.payload.starts_with(b"short"));
            assert!(datagram.payload[5..].iter().all(|&b| b == 0));
            assert_eq!(datagram.ttl, Some(3));
        }
        other => panic!("expected one datagram, got {:?}", other),
    }

    trigger.trigger();
    listeners.join().await;
}

#[tokio::test]
async fn test_shutdown_cancels_unbounded_senders() {
    let port = free_port();
    let range = AddressRange::parse(BLOCK).unwrap();
    let (trigger, shutdown) = shutdown_channel();
    let _receivers = bind_receivers(&range, port);

    let sender = FanOutSender::new(port, TransportConfig::default(), 8, Logger::quiet());
    let run = tokio::spawn(async move {
        sender
            .start(
                &range,
                MessageTemplate::text("forever {c}"),
                SendSchedule::new(Duration::from_millis(20), 1, 0),
                shutdown,
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    trigger.trigger();

    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("fan-out did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(report.attempted, 4);
    assert_eq!(report.cancelled, 4);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_closed_port_fails_only_that_worker() {
    let port = free_port();
    let range = AddressRange::parse(BLOCK).unwrap();
    // 127.0.0.4 is left without a receiver
    let _receivers: Vec<_> = range
        .iter()
        .skip(1)
        .map(|address| std::net::UdpSocket::bind((address, port)).unwrap())
        .collect();

    let sender = FanOutSender::new(port, TransportConfig::default(), 4, Logger::quiet());
    let report = sender
        .start(
            &range,
            MessageTemplate::text("knock {c}"),
            SendSchedule::new(Duration::from_millis(20), 1, 5),
            Shutdown::never(),
        )
        .await
        .unwrap();

    assert_eq!(report.attempted, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.cancelled, 0);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].address, Ipv4Addr::new(127, 0, 0, 4));
    assert!(
        report.failures[0].cause.contains("refused"),
        "{}",
        report.failures[0].cause
    );
}

#[tokio::test]
async fn test_listener_fan_out_stops_on_shutdown() {
    let port = free_port();
    let range = AddressRange::parse(BLOCK).unwrap();
    let (trigger, shutdown) = shutdown_channel();

    let listener = FanOutListener::new(port, None, 4, 8, Logger::quiet());
    let mut listeners = listener.listen(&range, shutdown).unwrap();
    settle().await;
    trigger.trigger();

    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        while listeners.next_event().await.is_some() {}
    })
    .await;
    assert!(ended.is_ok(), "listeners kept running after shutdown");
}
