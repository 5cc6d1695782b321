// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Group membership operations.
//!
//! Raw operations hand-build IGMP messages and send them through raw-IP
//! [`PacketTransport`]s (TTL 1, TOS CS6, optional Router Alert):
//!
//! | Operation | Message | Destination | Repeats |
//! |-----------|---------|-------------|---------|
//! | [`join_raw`] | v1/v2 report | the group | every interval until cancelled |
//! | [`leave_raw`] | v2 leave | 224.0.0.2 | `max_count` times |
//! | [`query`] | query | 224.0.0.1 or the group | `max_count` times (0 = forever) |
//!
//! [`join_native`] delegates to the kernel's IP_ADD_MEMBERSHIP and holds the
//! membership until cancelled.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::address_range::AddressRange;
use crate::error::{McastError, Result};
use crate::fanout::{run_fan_out, FanOutReport, WorkerOutcome};
use crate::interface::InterfaceHandle;
use crate::logging::{Facility, Logger};
use crate::protocols::igmp::{IgmpMessage, IgmpVersion, ALL_HOSTS_GROUP, ALL_ROUTERS_GROUP};
use crate::protocols::ip::TOS_INTERNETWORK_CONTROL;
use crate::receiver::MulticastListener;
use crate::scheduler::{self, MessageTemplate, SendOutcome, SendSchedule};
use crate::shutdown::Shutdown;
use crate::transport::{Endpoint, PacketTransport, ProtocolMode, TransportConfig};

/// Settings shared by the raw IGMP operations
#[derive(Debug, Clone)]
pub struct RawMembershipOptions {
    pub interface: Option<InterfaceHandle>,
    pub router_alert: bool,
    pub interval: Duration,
    /// 0 = until cancelled
    pub max_count: u64,
    pub max_concurrency: usize,
}

impl RawMembershipOptions {
    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            ttl: 1,
            tos: TOS_INTERNETWORK_CONTROL,
            padding_length: 0,
            local_endpoint: None,
            protocol_mode: ProtocolMode::RawIp,
            router_alert: self.router_alert,
            interface: self.interface.clone(),
        }
    }

    /// Raw headers from an interface carry its address as the source
    fn check_interface(&self) -> Result<()> {
        if let Some(interface) = &self.interface {
            interface.require_ipv4()?;
        }
        Ok(())
    }

    fn schedule(&self) -> SendSchedule {
        SendSchedule::new(self.interval, 1, self.max_count)
    }
}

/// Send one IGMP message per group of `range`, each from its own raw transport
async fn send_per_group<B, D>(
    range: &AddressRange,
    options: &RawMembershipOptions,
    build: B,
    destination: D,
    shutdown: Shutdown,
    logger: &Logger,
) -> Result<FanOutReport>
where
    B: Fn(Ipv4Addr) -> Result<IgmpMessage> + Copy + Send + 'static,
    D: Fn(Ipv4Addr) -> Ipv4Addr + Copy + Send + 'static,
{
    // Surface message errors (unsupported version) before any socket exists
    build(range.first())?;
    options.check_interface()?;

    let config = options.transport_config();
    let schedule = options.schedule();
    let worker_logger = logger.clone();

    run_fan_out(
        range,
        options.max_concurrency,
        shutdown,
        logger,
        move |group, mut shutdown| {
            let config = config.clone();
            let logger = worker_logger.clone();
            async move {
                let message = build(group)?;
                let template = MessageTemplate::fixed(message.to_bytes().to_vec());
                let endpoint = Endpoint::new(destination(group), 0);
                let mut transport = PacketTransport::new(endpoint, config, logger.clone());
                log_debug!(
                    logger,
                    Facility::Igmp,
                    "{} for {} to {}",
                    message.msg_type,
                    group,
                    transport.destination().address
                );
                let result =
                    scheduler::run(&mut transport, &template, &schedule, &mut shutdown, &logger)
                        .await;
                transport.close();
                Ok(if result?.cancelled {
                    WorkerOutcome::Cancelled
                } else {
                    WorkerOutcome::Completed
                })
            }
        },
    )
    .await
}

/// Send membership reports for every group of `range`.
///
/// Each report goes to the group itself and repeats every
/// `options.interval` until `options.max_count` is reached (0 = until
/// cancelled). IGMPv3 is an `UnsupportedOperation`.
pub async fn join_raw(
    range: &AddressRange,
    version: IgmpVersion,
    options: &RawMembershipOptions,
    shutdown: Shutdown,
    logger: &Logger,
) -> Result<FanOutReport> {
    log_notice!(logger, Facility::Igmp, "raw join of {} ({:?})", range, version);
    send_per_group(
        range,
        options,
        move |group| IgmpMessage::report(version, group),
        |group| group,
        shutdown,
        logger,
    )
    .await
}

/// Send IGMPv2 Leave Group messages for every group of `range` to all-routers.
///
/// IGMPv1 has no leave message and is an `UnsupportedOperation`.
pub async fn leave_raw(
    range: &AddressRange,
    version: IgmpVersion,
    options: &RawMembershipOptions,
    shutdown: Shutdown,
    logger: &Logger,
) -> Result<FanOutReport> {
    version.leave_type()?;
    log_notice!(logger, Facility::Igmp, "leave of {}", range);
    send_per_group(
        range,
        options,
        |group| Ok(IgmpMessage::leave(group)),
        |_| ALL_ROUTERS_GROUP,
        shutdown,
        logger,
    )
    .await
}

/// Query settings
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// `None` sends general queries
    pub group: Option<Ipv4Addr>,
    pub max_response_time_secs: u8,
    /// Querier election; not implemented
    pub play_nice: bool,
}

/// Send membership queries: general queries to all-hosts, group-specific
/// queries to the group.
pub async fn query(
    request: &QueryOptions,
    options: &RawMembershipOptions,
    mut shutdown: Shutdown,
    logger: &Logger,
) -> Result<SendOutcome> {
    if request.play_nice {
        return Err(McastError::UnsupportedOperation(
            "querier election (play-nice)".to_string(),
        ));
    }
    let message = IgmpMessage::query(request.max_response_time_secs, request.group)?;
    options.check_interface()?;
    let destination = request.group.unwrap_or(ALL_HOSTS_GROUP);

    log_notice!(
        logger,
        Facility::Igmp,
        "{} query to {} (max response {}s)",
        if message.is_general_query() {
            "general"
        } else {
            "group-specific"
        },
        destination,
        request.max_response_time_secs
    );

    let mut transport = PacketTransport::new(
        Endpoint::new(destination, 0),
        options.transport_config(),
        logger.clone(),
    );
    let template = MessageTemplate::fixed(message.to_bytes().to_vec());
    let result = scheduler::run(
        &mut transport,
        &template,
        &options.schedule(),
        &mut shutdown,
        logger,
    )
    .await;
    transport.close();
    result
}

/// Reject kernel-native join settings only the raw path supports
pub fn check_native_join(range: &AddressRange, router_alert: bool) -> Result<()> {
    if range.len() > 1 {
        return Err(McastError::ConfigurationConflict(format!(
            "joining {} needs --raw; native join takes a single group",
            range
        )));
    }
    if router_alert {
        return Err(McastError::ConfigurationConflict(
            "--router-alert needs --raw".to_string(),
        ));
    }
    Ok(())
}

/// Join `group` through the host stack and hold the membership until
/// `shutdown` fires. Dropping the socket lets the kernel send the leave.
pub async fn join_native(
    group: Ipv4Addr,
    port: u16,
    interface: Option<&InterfaceHandle>,
    mut shutdown: Shutdown,
    logger: &Logger,
) -> Result<()> {
    if !group.is_multicast() {
        return Err(McastError::ConfigurationConflict(format!(
            "{} is not a multicast group",
            group
        )));
    }
    let membership = MulticastListener::bind(group, port, interface, logger.clone())?;
    log_notice!(logger, Facility::Igmp, "joined {} (kernel)", group);
    shutdown.wait().await;
    drop(membership);
    log_info!(logger, Facility::Igmp, "released {}", group);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::shutdown_channel;

    fn options() -> RawMembershipOptions {
        RawMembershipOptions {
            interface: None,
            router_alert: true,
            interval: Duration::from_millis(5),
            max_count: 1,
            max_concurrency: 4,
        }
    }

    #[test]
    fn test_raw_transport_config() {
        let config = options().transport_config();
        assert_eq!(config.ttl, 1);
        assert_eq!(config.tos, 0xc0);
        assert_eq!(config.protocol_mode, ProtocolMode::RawIp);
        assert!(config.router_alert);
    }

    #[test]
    fn test_check_native_join() {
        let single = AddressRange::parse("239.1.1.1").unwrap();
        let block = AddressRange::parse("239.1.1.0/30").unwrap();
        assert!(check_native_join(&single, false).is_ok());
        assert!(matches!(
            check_native_join(&block, false),
            Err(McastError::ConfigurationConflict(_))
        ));
        assert!(matches!(
            check_native_join(&single, true),
            Err(McastError::ConfigurationConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_v3_join_rejected_before_sockets() {
        let range = AddressRange::parse("239.1.1.0/30").unwrap();
        let (_trigger, shutdown) = shutdown_channel();
        let result =
            join_raw(&range, IgmpVersion::V3, &options(), shutdown, &Logger::quiet()).await;
        assert!(matches!(result, Err(McastError::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_v1_leave_rejected() {
        let range = AddressRange::parse("239.1.1.1").unwrap();
        let (_trigger, shutdown) = shutdown_channel();
        let result =
            leave_raw(&range, IgmpVersion::V1, &options(), shutdown, &Logger::quiet()).await;
        assert!(matches!(result, Err(McastError::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_play_nice_rejected() {
        let (_trigger, shutdown) = shutdown_channel();
        let query_options = QueryOptions {
            group: None,
            max_response_time_secs: 10,
            play_nice: true,
        };
        let result = query(&query_options, &options(), shutdown, &Logger::quiet()).await;
        assert!(matches!(result, Err(McastError::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_query_response_time_overflow() {
        let (_trigger, shutdown) = shutdown_channel();
        let query_options = QueryOptions {
            group: None,
            max_response_time_secs: 60,
            play_nice: false,
        };
        let result = query(&query_options, &options(), shutdown, &Logger::quiet()).await;
        assert!(matches!(result, Err(McastError::ConfigurationConflict(_))));
    }

    #[tokio::test]
    async fn test_native_join_rejects_unicast() {
        let (_trigger, shutdown) = shutdown_channel();
        let result = join_native(
            Ipv4Addr::new(10, 0, 0, 1),
            5050,
            None,
            shutdown,
            &Logger::quiet(),
        )
        .await;
        assert!(matches!(result, Err(McastError::ConfigurationConflict(_))));
    }
}
