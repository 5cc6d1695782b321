// SPDX-License-Identifier: Apache-2.0 OR MIT
use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use mcast::address_range::is_cidr;
use mcast::config::{McastConfig, Section};
use mcast::interface;
use mcast::logging::{Facility, Logger, Severity};
use mcast::membership::{self, QueryOptions, RawMembershipOptions};
use mcast::protocols::igmp::IgmpVersion;
use mcast::{
    log_info, log_warning, shutdown_channel, AddressRange, ConfigError, Endpoint,
    FanOutListener, FanOutReport, FanOutSender, ListenerEvent, McastError, MessageTemplate,
    InterfaceHandle, ProtocolMode, SendSchedule, Shutdown, TransportConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON5 file with defaults for every subcommand
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimum log level (emergency..debug or 0-7)
    #[arg(long, global = true, default_value = "info")]
    log_level: Severity,

    /// Log JSON lines instead of text
    #[arg(long, global = true)]
    json_logs: bool,

    /// Per-facility level overriding --log-level, e.g. `fanout=debug`
    #[arg(long, global = true, value_name = "FACILITY=LEVEL", value_parser = parse_facility_level)]
    log_facility: Vec<(Facility, Severity)>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Send UDP datagrams to a group or every address of a CIDR block
    Send(SendArgs),
    /// Print datagrams arriving on a group or every address of a CIDR block
    Receive(ReceiveArgs),
    /// Join groups, natively or with hand-built IGMP reports (--raw)
    Join(JoinArgs),
    /// Send IGMPv2 Leave Group messages
    Leave(LeaveArgs),
    /// Send IGMP membership queries
    Query(QueryArgs),
}

#[derive(ClapArgs, Debug, Default, PartialEq)]
struct SendArgs {
    /// Destination address or CIDR block
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Local address to send from (host:port)
    #[arg(long)]
    interface_ip: Option<String>,
    #[arg(long)]
    ttl: Option<u8>,
    #[arg(long)]
    tos: Option<u8>,
    /// Message text; `{c}` is replaced with the counter
    #[arg(long)]
    text: Option<String>,
    /// Zero-pad every datagram to this many bytes
    #[arg(long)]
    padding: Option<usize>,
    /// Milliseconds between sends
    #[arg(long)]
    interval: Option<u64>,
    #[arg(long)]
    start_value: Option<u64>,
    /// Number of datagrams per address (0 = until interrupted)
    #[arg(long)]
    max: Option<u64>,
    /// Outgoing interface for multicast
    #[arg(long)]
    interface: Option<String>,
}

#[derive(ClapArgs, Debug, Default, PartialEq)]
struct ReceiveArgs {
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    interface: Option<String>,
    /// Print payloads (`--show false` prints notices only)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    show: Option<bool>,
}

#[derive(ClapArgs, Debug, Default, PartialEq)]
struct JoinArgs {
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    interface: Option<String>,
    /// Send hand-built IGMP reports instead of joining through the kernel
    #[arg(long)]
    raw: bool,
    /// Milliseconds between raw reports
    #[arg(long)]
    interval: Option<u64>,
    #[arg(long)]
    router_alert: bool,
    #[arg(long)]
    igmp_version: Option<u8>,
}

#[derive(ClapArgs, Debug, Default, PartialEq)]
struct LeaveArgs {
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    interface: Option<String>,
    /// Milliseconds between leaves
    #[arg(long)]
    interval: Option<u64>,
    #[arg(long)]
    max: Option<u64>,
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    router_alert: Option<bool>,
    #[arg(long, default_value_t = 2)]
    igmp_version: u8,
}

#[derive(ClapArgs, Debug, Default, PartialEq)]
struct QueryArgs {
    #[arg(long)]
    interface: Option<String>,
    /// Seconds between queries
    #[arg(long)]
    interval: Option<u64>,
    /// Seconds hosts may wait before reporting
    #[arg(long)]
    max_response_time: Option<u8>,
    #[arg(long)]
    max: Option<u64>,
    /// Group-specific query; general query when omitted
    #[arg(long)]
    group: Option<Ipv4Addr>,
    /// Stand down when another querier is present
    #[arg(long)]
    play_nice: bool,
}

fn parse_facility_level(value: &str) -> std::result::Result<(Facility, Severity), String> {
    let (facility, level) = value
        .split_once('=')
        .ok_or_else(|| format!("expected FACILITY=LEVEL, got '{}'", value))?;
    Ok((facility.parse()?, level.parse()?))
}

impl Command {
    fn section(&self) -> Section {
        match self {
            Command::Send(_) => Section::Send,
            Command::Receive(_) => Section::Receive,
            Command::Join(_) => Section::Join,
            Command::Leave(_) => Section::Leave,
            Command::Query(_) => Section::Query,
        }
    }

    /// Fold command-line values over the file defaults
    fn apply(&self, config: &mut McastConfig) {
        match self {
            Command::Send(args) => {
                let send = &mut config.send;
                override_with(&mut send.group, &args.group);
                override_with(&mut send.port, &args.port);
                override_with(&mut send.ttl, &args.ttl);
                override_with(&mut send.tos, &args.tos);
                override_with(&mut send.text, &args.text);
                override_with(&mut send.padding, &args.padding);
                override_with(&mut send.interval_ms, &args.interval);
                override_with(&mut send.start_value, &args.start_value);
                override_with(&mut send.max, &args.max);
                if args.interface_ip.is_some() {
                    send.local_address = args.interface_ip.clone();
                }
                if args.interface.is_some() {
                    send.interface = args.interface.clone();
                }
            }
            Command::Receive(args) => {
                let receive = &mut config.receive;
                override_with(&mut receive.group, &args.group);
                override_with(&mut receive.port, &args.port);
                override_with(&mut receive.show, &args.show);
                if args.interface.is_some() {
                    receive.interface = args.interface.clone();
                }
            }
            Command::Join(args) => {
                let join = &mut config.join;
                override_with(&mut join.group, &args.group);
                override_with(&mut join.port, &args.port);
                override_with(&mut join.interval_ms, &args.interval);
                override_with(&mut join.igmp_version, &args.igmp_version);
                join.raw |= args.raw;
                join.router_alert |= args.router_alert;
                if args.interface.is_some() {
                    join.interface = args.interface.clone();
                }
            }
            Command::Leave(args) => {
                let leave = &mut config.leave;
                override_with(&mut leave.group, &args.group);
                override_with(&mut leave.interval_ms, &args.interval);
                override_with(&mut leave.max, &args.max);
                override_with(&mut leave.router_alert, &args.router_alert);
                if args.interface.is_some() {
                    leave.interface = args.interface.clone();
                }
            }
            Command::Query(args) => {
                let query = &mut config.query;
                override_with(&mut query.interval_secs, &args.interval);
                override_with(&mut query.max_response_time_secs, &args.max_response_time);
                override_with(&mut query.max, &args.max);
                if args.interface.is_some() {
                    query.interface = args.interface.clone();
                }
                if args.group.is_some() {
                    query.group = args.group;
                }
            }
        }
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn load_config(path: Option<&PathBuf>, command: &Command) -> Result<McastConfig> {
    let mut config = match path {
        Some(path) => McastConfig::load_from_file(path)?,
        None => McastConfig::default(),
    };
    command.apply(&mut config);
    config.validate(command.section())?;
    Ok(config)
}

/// 2 for configuration failures, 1 for everything else
fn exit_code(err: &anyhow::Error) -> u8 {
    let configuration = err.downcast_ref::<ConfigError>().is_some()
        || err
            .downcast_ref::<McastError>()
            .is_some_and(McastError::is_configuration);
    if configuration {
        2
    } else {
        1
    }
}

/// Look up the interface hint, warning when it cannot carry multicast
fn resolve_interface(hint: Option<&str>, logger: &Logger) -> Result<Option<InterfaceHandle>> {
    let interface = interface::lookup_hint(hint)?;
    if let Some(reason) = interface
        .as_ref()
        .and_then(InterfaceHandle::multicast_unsupported_reason)
    {
        log_warning!(logger, Facility::Network, "{}: {}", hint.unwrap_or_default(), reason);
    }
    Ok(interface)
}

fn check_report(report: &FanOutReport, logger: &Logger) -> Result<()> {
    log_info!(logger, Facility::Cli, "fan-out finished: {}", report);
    for failure in &report.failures {
        eprintln!("{}: {}", failure.address, failure.cause);
    }
    if report.failed() > 0 {
        bail!("{}", report);
    }
    Ok(())
}

async fn send(config: &McastConfig, shutdown: Shutdown, logger: &Logger) -> Result<()> {
    let settings = &config.send;
    let range = AddressRange::parse(&settings.group)?;
    let interface = resolve_interface(settings.interface.as_deref(), logger)?;
    let local_endpoint = settings
        .local_address
        .as_deref()
        .map(Endpoint::parse_local)
        .transpose()?;

    let source = settings
        .local_address
        .clone()
        .or_else(|| interface.as_ref().and_then(|i| i.ipv4).map(|ip| ip.to_string()))
        .unwrap_or_else(|| "host-chosen-address".to_string());
    println!("Sending from {} to {}:{}", source, settings.group, settings.port);
    if is_cidr(&settings.group) {
        log_info!(
            logger,
            Facility::Cli,
            "{} expands to {} destinations",
            settings.group,
            range.len()
        );
    }

    let transport = TransportConfig {
        ttl: settings.ttl,
        tos: settings.tos,
        padding_length: settings.padding,
        local_endpoint,
        protocol_mode: ProtocolMode::Udp,
        router_alert: false,
        interface,
    };
    let schedule = SendSchedule::new(
        Duration::from_millis(settings.interval_ms),
        settings.start_value,
        settings.max,
    );
    let sender = FanOutSender::new(
        settings.port,
        transport,
        config.limits.max_send_concurrency,
        logger.clone(),
    );
    let report = sender
        .start(&range, MessageTemplate::text(&settings.text), schedule, shutdown)
        .await?;
    check_report(&report, logger)
}

async fn receive(config: &McastConfig, mut shutdown: Shutdown, logger: &Logger) -> Result<()> {
    let settings = &config.receive;
    let range = AddressRange::parse(&settings.group)?;
    let interface = resolve_interface(settings.interface.as_deref(), logger)?;

    let listener = FanOutListener::new(
        settings.port,
        interface.clone(),
        config.limits.max_listeners,
        config.limits.channel_capacity,
        logger.clone(),
    );
    let mut listeners = listener.listen(&range, shutdown.clone())?;
    println!(
        "Listening on {}:{} interface: {}",
        settings.group,
        settings.port,
        interface.as_ref().map_or("host-chosen", |i| i.name.as_str())
    );

    let mut failed = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            event = listeners.next_event() => match event {
                Some(ListenerEvent::Datagram(datagram)) => {
                    println!("{}", datagram.notice());
                    if settings.show {
                        println!("{}", datagram.payload_text());
                        println!();
                    }
                }
                Some(event @ ListenerEvent::Failed { .. }) => {
                    eprintln!("{}", event);
                    failed += 1;
                }
                None => break,
            },
        }
    }

    let total = listeners.listener_count();
    listeners.join().await;
    if failed > 0 && failed == total {
        bail!("all {} listeners failed", total);
    }
    if failed > 0 {
        log_warning!(logger, Facility::Cli, "{} of {} listeners failed", failed, total);
    }
    Ok(())
}

async fn join(config: &McastConfig, shutdown: Shutdown, logger: &Logger) -> Result<()> {
    let settings = &config.join;
    let range = AddressRange::parse(&settings.group)?;
    let interface = resolve_interface(settings.interface.as_deref(), logger)?;

    if !settings.raw {
        membership::check_native_join(&range, settings.router_alert)?;
        membership::join_native(
            range.first(),
            settings.port,
            interface.as_ref(),
            shutdown,
            logger,
        )
        .await?;
        return Ok(());
    }

    let version = IgmpVersion::try_from(settings.igmp_version)?;
    let options = RawMembershipOptions {
        interface,
        router_alert: settings.router_alert,
        interval: Duration::from_millis(settings.interval_ms),
        max_count: 0,
        max_concurrency: config.limits.max_send_concurrency,
    };
    let report = membership::join_raw(&range, version, &options, shutdown, logger).await?;
    check_report(&report, logger)
}

async fn leave(
    config: &McastConfig,
    version: u8,
    shutdown: Shutdown,
    logger: &Logger,
) -> Result<()> {
    let settings = &config.leave;
    let range = AddressRange::parse(&settings.group)?;
    let version = IgmpVersion::try_from(version)?;
    let options = RawMembershipOptions {
        interface: resolve_interface(settings.interface.as_deref(), logger)?,
        router_alert: settings.router_alert,
        interval: Duration::from_millis(settings.interval_ms),
        max_count: settings.max,
        max_concurrency: config.limits.max_send_concurrency,
    };
    let report = membership::leave_raw(&range, version, &options, shutdown, logger).await?;
    check_report(&report, logger)
}

async fn query(
    config: &McastConfig,
    play_nice: bool,
    shutdown: Shutdown,
    logger: &Logger,
) -> Result<()> {
    let settings = &config.query;
    let request = QueryOptions {
        group: settings.group,
        max_response_time_secs: settings.max_response_time_secs,
        play_nice,
    };
    let options = RawMembershipOptions {
        interface: resolve_interface(settings.interface.as_deref(), logger)?,
        router_alert: true,
        interval: Duration::from_secs(settings.interval_secs),
        max_count: settings.max,
        max_concurrency: 1,
    };
    let outcome = membership::query(&request, &options, shutdown, logger).await?;
    log_info!(logger, Facility::Cli, "sent {} queries", outcome.sent);
    Ok(())
}

async fn run(args: Args, logger: Logger) -> Result<()> {
    let config = load_config(args.config.as_ref(), &args.command)
        .context("invalid configuration")?;

    let (trigger, shutdown) = shutdown_channel();
    let signal_logger = logger.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_info!(signal_logger, Facility::Cli, "interrupted, shutting down");
            trigger.trigger();
        }
    });

    match &args.command {
        Command::Send(_) => send(&config, shutdown, &logger).await,
        Command::Receive(_) => receive(&config, shutdown, &logger).await,
        Command::Join(_) => join(&config, shutdown, &logger).await,
        Command::Leave(leave_args) => {
            leave(&config, leave_args.igmp_version, shutdown, &logger).await
        }
        Command::Query(query_args) => {
            query(&config, query_args.play_nice, shutdown, &logger).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let logger = if args.json_logs {
        Logger::stderr_json(args.log_level)
    } else {
        Logger::stderr_text(args.log_level)
    };
    for &(facility, level) in &args.log_facility {
        logger.set_facility_level(facility, level);
    }

    match run(args, logger).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_parsing() {
        let args = Args::parse_from(["mcast", "send", "--group", "239.1.1.0/30", "--max", "3"]);
        assert_eq!(args.log_level, Severity::Info);
        assert_eq!(
            args.command,
            Command::Send(SendArgs {
                group: Some("239.1.1.0/30".to_string()),
                max: Some(3),
                ..SendArgs::default()
            })
        );

        let args = Args::parse_from(["mcast", "receive", "--show", "--log-level", "debug"]);
        assert_eq!(args.log_level, Severity::Debug);
        assert_eq!(
            args.command,
            Command::Receive(ReceiveArgs {
                show: Some(true),
                ..ReceiveArgs::default()
            })
        );

        let args = Args::parse_from(["mcast", "leave", "--router-alert", "false"]);
        match args.command {
            Command::Leave(leave) => {
                assert_eq!(leave.router_alert, Some(false));
                assert_eq!(leave.igmp_version, 2);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let args = Args::parse_from([
            "mcast",
            "--log-facility",
            "fanout=debug",
            "--log-facility",
            "Listener=3",
            "send",
        ]);
        assert_eq!(
            args.log_facility,
            vec![
                (Facility::FanOut, Severity::Debug),
                (Facility::Listener, Severity::Error)
            ]
        );

        assert!(Args::try_parse_from(["mcast", "send", "--ttl", "300"]).is_err());
        assert!(Args::try_parse_from(["mcast", "--log-facility", "fanout", "send"]).is_err());
        assert!(Args::try_parse_from(["mcast", "--log-facility", "relay=debug", "send"]).is_err());
        assert!(Args::try_parse_from(["mcast", "query", "--group", "not-an-ip"]).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = McastConfig::parse("{ join: { group: '239.2.2.2', interval_ms: 500 } }")
            .unwrap();
        let command = Command::Join(JoinArgs {
            raw: true,
            interval: Some(250),
            ..JoinArgs::default()
        });
        command.apply(&mut config);

        assert_eq!(config.join.group, "239.2.2.2");
        assert_eq!(config.join.interval_ms, 250);
        assert!(config.join.raw);
        assert!(!config.join.router_alert);
    }

    #[test]
    fn test_invalid_override_is_configuration_error() {
        let command = Command::Query(QueryArgs {
            max_response_time: Some(30),
            ..QueryArgs::default()
        });
        let err = load_config(None, &command).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_other_sections_do_not_block_a_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcast.json5");
        std::fs::write(&path, "{ join: { group: 'not-a-group' } }").unwrap();

        let send = Command::Send(SendArgs::default());
        assert!(load_config(Some(&path), &send).is_ok());

        let join = Command::Join(JoinArgs::default());
        let err = load_config(Some(&path), &join).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_exit_codes() {
        let conflict = anyhow::Error::new(McastError::ConfigurationConflict("x".into()));
        assert_eq!(exit_code(&conflict), 2);

        let socket = anyhow::Error::new(McastError::Socket {
            context: "bind".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        })
        .context("receive");
        assert_eq!(exit_code(&socket), 1);

        let config = anyhow::Error::new(ConfigError::ParseError("bad".into()))
            .context("invalid configuration");
        assert_eq!(exit_code(&config), 2);
    }
}
