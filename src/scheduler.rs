// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Repeated-send scheduler.
//!
//! Drives one [`DatagramSink`] through a fixed number of sends (or forever)
//! at a fixed interval, substituting an incrementing counter into a text
//! template. Sends are strictly sequential; the interval is slept between
//! sends, never after the last one. Every sleep and send races the shutdown
//! signal.

use std::borrow::Cow;
use std::time::Duration;

use crate::error::Result;
use crate::logging::{Facility, Logger};
use crate::shutdown::Shutdown;
use crate::transport::DatagramSink;

/// Token replaced by the current counter value
pub const COUNTER_PLACEHOLDER: &str = "{c}";

/// Payload source for a scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTemplate {
    /// UTF-8 text; the first `{c}` becomes the counter in decimal
    Text(String),
    /// Sent unchanged every time
    Fixed(Vec<u8>),
}

impl MessageTemplate {
    pub fn text(template: impl Into<String>) -> Self {
        MessageTemplate::Text(template.into())
    }

    pub fn fixed(bytes: impl Into<Vec<u8>>) -> Self {
        MessageTemplate::Fixed(bytes.into())
    }

    pub fn has_counter(&self) -> bool {
        matches!(self, MessageTemplate::Text(text) if text.contains(COUNTER_PLACEHOLDER))
    }

    /// Payload for one send
    pub fn render(&self, counter: u64) -> Cow<'_, [u8]> {
        match self {
            MessageTemplate::Text(text) if self.has_counter() => Cow::Owned(
                text.replacen(COUNTER_PLACEHOLDER, &counter.to_string(), 1)
                    .into_bytes(),
            ),
            MessageTemplate::Text(text) => Cow::Borrowed(text.as_bytes()),
            MessageTemplate::Fixed(bytes) => Cow::Borrowed(bytes),
        }
    }
}

/// How many sends and how far apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSchedule {
    pub interval: Duration,
    pub start_counter: u64,
    /// 1 = once, N = exactly N sends, 0 = until cancelled or a send fails
    pub max_count: u64,
}

impl SendSchedule {
    pub fn new(interval: Duration, start_counter: u64, max_count: u64) -> Self {
        Self {
            interval,
            start_counter,
            max_count,
        }
    }

    pub fn once() -> Self {
        Self::new(Duration::ZERO, 1, 1)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_count == 0
    }

    /// Counter value with the longest decimal rendering this schedule reaches.
    ///
    /// `None` when unbounded; such a run can outgrow its padding partway
    /// through and then fails at the send that overflows.
    pub fn widest_counter(&self) -> Option<u64> {
        if self.is_unbounded() {
            return None;
        }
        // a counter that wraps passes through u64::MAX
        Some(
            self.start_counter
                .checked_add(self.max_count - 1)
                .unwrap_or(u64::MAX),
        )
    }

    fn is_done(&self, sent: u64) -> bool {
        !self.is_unbounded() && sent >= self.max_count
    }
}

impl Default for SendSchedule {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 1, 0)
    }
}

/// Result of a scheduler run that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub sent: u64,
    /// Stopped by the shutdown signal before reaching `max_count`
    pub cancelled: bool,
}

/// Run `schedule` against `sink`.
///
/// Any send failure aborts the loop and is returned; the counter is not
/// resumable. The sink is left open; closing it is the owner's job.
pub async fn run<S: DatagramSink>(
    sink: &mut S,
    template: &MessageTemplate,
    schedule: &SendSchedule,
    shutdown: &mut Shutdown,
    logger: &Logger,
) -> Result<SendOutcome> {
    let mut counter = schedule.start_counter;
    let mut sent: u64 = 0;

    loop {
        if shutdown.is_triggered() {
            return Ok(SendOutcome {
                sent,
                cancelled: true,
            });
        }

        let payload = template.render(counter);
        let written = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                return Ok(SendOutcome { sent, cancelled: true });
            }
            result = sink.send_datagram(&payload) => result?,
        };
        logger.debug(
            Facility::Scheduler,
            &format!("sent {} bytes (counter {})", written, counter),
        );

        sent += 1;
        counter = counter.wrapping_add(1);
        if schedule.is_done(sent) {
            return Ok(SendOutcome {
                sent,
                cancelled: false,
            });
        }

        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                return Ok(SendOutcome { sent, cancelled: true });
            }
            _ = tokio::time::sleep(schedule.interval) => {}
        }
    }
}
