// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Bounded concurrent fan-out over an address range.
//!
//! One worker per address, at most `max_concurrency` alive at once: a
//! semaphore permit is acquired before each spawn and released when the
//! worker finishes. A failing worker is logged and recorded in the
//! [`FanOutReport`]; its siblings keep running. Shutdown stops further spawns
//! and is passed to every running worker.

use std::fmt;
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::address_range::AddressRange;
use crate::error::{McastError, Result};
use crate::logging::{Facility, Logger};
use crate::scheduler::{self, MessageTemplate, SendSchedule};
use crate::shutdown::Shutdown;
use crate::transport::{DatagramSink, Endpoint, PacketTransport, TransportConfig};

/// How a worker that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed,
    Cancelled,
}

/// One address whose worker failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressFailure {
    pub address: Ipv4Addr,
    pub cause: String,
}

/// Aggregate result of a fan-out.
///
/// `attempted == succeeded + cancelled + failures.len()`. Addresses never
/// reached because of shutdown are not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub attempted: u64,
    pub succeeded: u64,
    pub cancelled: u64,
    pub failures: Vec<AddressFailure>,
}

impl FanOutReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }

    pub fn failed(&self) -> u64 {
        self.failures.len() as u64
    }

    fn record(&mut self, address: Ipv4Addr, result: std::result::Result<WorkerOutcome, String>) {
        match result {
            Ok(WorkerOutcome::Completed) => self.succeeded += 1,
            Ok(WorkerOutcome::Cancelled) => self.cancelled += 1,
            Err(cause) => self.failures.push(AddressFailure { address, cause }),
        }
    }
}

impl fmt::Display for FanOutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} succeeded, {} cancelled, {} failed",
            self.attempted,
            self.succeeded,
            self.cancelled,
            self.failures.len()
        )
    }
}

/// Run `worker` once per address in `range`, at most `max_concurrency` at a time.
///
/// `worker` receives the address and a clone of the shutdown signal.
pub async fn run_fan_out<F, Fut>(
    range: &AddressRange,
    max_concurrency: usize,
    mut shutdown: Shutdown,
    logger: &Logger,
    worker: F,
) -> Result<FanOutReport>
where
    F: Fn(Ipv4Addr, Shutdown) -> Fut,
    Fut: Future<Output = Result<WorkerOutcome>> + Send + 'static,
{
    if max_concurrency == 0 {
        return Err(McastError::ConfigurationConflict(
            "fan-out concurrency limit must be at least 1".to_string(),
        ));
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks: JoinSet<(Ipv4Addr, std::result::Result<WorkerOutcome, String>)> =
        JoinSet::new();
    let mut report = FanOutReport::default();

    logger.info(
        Facility::FanOut,
        &format!(
            "fan-out over {} ({} addresses, {} concurrent)",
            range,
            range.len(),
            max_concurrency
        ),
    );

    for address in range.iter() {
        let permit = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        // Reap finished workers so the set stays bounded by the permit count
        while let Some(joined) = tasks.try_join_next() {
            collect(&mut report, joined, logger);
        }

        report.attempted += 1;
        let job = worker(address, shutdown.clone());
        tasks.spawn(async move {
            let _permit = permit;
            // Inner task isolates panics so the address is still known
            let result = match tokio::spawn(job).await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("worker task failed: {}", e)),
            };
            (address, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        collect(&mut report, joined, logger);
    }

    logger.info(Facility::FanOut, &format!("fan-out finished: {}", report));
    Ok(report)
}

fn collect(
    report: &mut FanOutReport,
    joined: std::result::Result<
        (Ipv4Addr, std::result::Result<WorkerOutcome, String>),
        tokio::task::JoinError,
    >,
    logger: &Logger,
) {
    match joined {
        Ok((address, result)) => {
            if let Err(cause) = &result {
                log_warning!(logger, Facility::FanOut, "{} failed: {}", address, cause);
            }
            report.record(address, result);
        }
        // The wrapper task only awaits; it fails only if the runtime aborts it
        Err(e) => log_error!(logger, Facility::FanOut, "fan-out task lost: {}", e),
    }
}

/// Sends the same schedule to every address of a range
#[derive(Clone)]
pub struct FanOutSender {
    port: u16,
    config: TransportConfig,
    max_concurrency: usize,
    logger: Logger,
}

impl FanOutSender {
    pub fn new(
        port: u16,
        config: TransportConfig,
        max_concurrency: usize,
        logger: Logger,
    ) -> Self {
        Self {
            port,
            config,
            max_concurrency,
            logger,
        }
    }

    /// One [`PacketTransport`] per address, all sharing this sender's config
    pub async fn start(
        &self,
        range: &AddressRange,
        template: MessageTemplate,
        schedule: SendSchedule,
        shutdown: Shutdown,
    ) -> Result<FanOutReport> {
        // Fail on a padding conflict before any socket exists
        let widest = schedule.widest_counter().unwrap_or(schedule.start_counter);
        self.config.check_padding(template.render(widest).len())?;

        let config = self.config.clone();
        let logger = self.logger.clone();
        self.start_with(range, template, schedule, shutdown, move |endpoint| {
            PacketTransport::new(endpoint, config.clone(), logger.clone())
        })
        .await
    }

    /// Like [`start`](Self::start) with a caller-supplied sink per endpoint
    pub async fn start_with<S, M>(
        &self,
        range: &AddressRange,
        template: MessageTemplate,
        schedule: SendSchedule,
        shutdown: Shutdown,
        make_sink: M,
    ) -> Result<FanOutReport>
    where
        S: DatagramSink + 'static,
        M: Fn(Endpoint) -> S + Send + Sync + 'static,
    {
        let template = Arc::new(template);
        let make_sink = Arc::new(make_sink);
        let port = self.port;
        let logger = self.logger.clone();

        run_fan_out(
            range,
            self.max_concurrency,
            shutdown,
            &self.logger,
            move |address, mut shutdown| {
                let template = template.clone();
                let make_sink = make_sink.clone();
                let logger = logger.clone();
                async move {
                    let mut sink = (*make_sink)(Endpoint::new(address, port));
                    let result =
                        scheduler::run(&mut sink, &template, &schedule, &mut shutdown, &logger)
                            .await;
                    sink.close();
                    let outcome = result?;
                    Ok(if outcome.cancelled {
                        WorkerOutcome::Cancelled
                    } else {
                        WorkerOutcome::Completed
                    })
                }
            },
        )
        .await
    }
}
