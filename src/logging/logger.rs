// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger handle with global and per-facility level filtering

use super::entry::LogEntry;
use super::sink::{JsonSink, LogSink, MemorySink, TextSink};
use super::{Facility, Severity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

/// Logger handle for writing log entries
///
/// This is a lightweight handle that can be cloned into every fan-out worker.
/// Clones share the sink and the level settings.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    /// Global minimum log level (default: Info)
    global_min_level: Arc<AtomicU8>,
    /// Per-facility minimum log levels
    facility_min_levels: Arc<RwLock<HashMap<Facility, Severity>>>,
}

impl Logger {
    pub fn with_sink(sink: Arc<dyn LogSink>, level: Severity) -> Self {
        Self {
            sink,
            global_min_level: Arc::new(AtomicU8::new(level as u8)),
            facility_min_levels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Human-readable lines on stderr
    pub fn stderr_text(level: Severity) -> Self {
        Self::with_sink(Arc::new(TextSink), level)
    }

    /// JSON lines on stderr
    pub fn stderr_json(level: Severity) -> Self {
        Self::with_sink(Arc::new(JsonSink), level)
    }

    /// Logger capturing everything down to Debug, plus the capture handle
    pub fn memory() -> (Self, MemorySink) {
        let sink = MemorySink::new();
        (
            Self::with_sink(Arc::new(sink.clone()), Severity::Debug),
            sink,
        )
    }

    /// Logger that drops everything below Emergency
    pub fn quiet() -> Self {
        Self::with_sink(Arc::new(MemorySink::new()), Severity::Emergency)
    }

    /// Whether an entry at `severity` from `facility` would be written
    #[inline]
    pub fn enabled(&self, severity: Severity, facility: Facility) -> bool {
        // Facility-specific level overrides the global one
        if let Ok(levels) = self.facility_min_levels.read() {
            if let Some(&min_level) = levels.get(&facility) {
                return severity <= min_level;
            }
        }
        (severity as u8) <= self.global_min_level.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn log(&self, severity: Severity, facility: Facility, message: &str) {
        if !self.enabled(severity, facility) {
            return;
        }
        self.sink
            .write_entry(&LogEntry::new(severity, facility, message));
    }

    #[inline]
    pub fn log_kv(
        &self,
        severity: Severity,
        facility: Facility,
        message: &str,
        kvs: &[(&str, &str)],
    ) {
        if !self.enabled(severity, facility) {
            return;
        }
        let mut entry = LogEntry::new(severity, facility, message);
        for (key, value) in kvs {
            entry.add_kv(key, value);
        }
        self.sink.write_entry(&entry);
    }

    #[inline]
    pub fn error(&self, facility: Facility, message: &str) {
        self.log(Severity::Error, facility, message);
    }

    #[inline]
    pub fn warning(&self, facility: Facility, message: &str) {
        self.log(Severity::Warning, facility, message);
    }

    #[inline]
    pub fn notice(&self, facility: Facility, message: &str) {
        self.log(Severity::Notice, facility, message);
    }

    #[inline]
    pub fn info(&self, facility: Facility, message: &str) {
        self.log(Severity::Info, facility, message);
    }

    #[inline]
    pub fn debug(&self, facility: Facility, message: &str) {
        self.log(Severity::Debug, facility, message);
    }

    pub fn set_global_level(&self, level: Severity) {
        self.global_min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> Severity {
        Severity::from_u8(self.global_min_level.load(Ordering::Relaxed)).unwrap_or(Severity::Info)
    }

    /// Override the global level for one facility
    pub fn set_facility_level(&self, facility: Facility, level: Severity) {
        if let Ok(mut levels) = self.facility_min_levels.write() {
            levels.insert(facility, level);
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("global_level", &self.global_level())
            .finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::stderr_text(Severity::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_level_filters() {
        let (logger, sink) = Logger::memory();
        logger.set_global_level(Severity::Warning);

        logger.info(Facility::Test, "dropped");
        logger.warning(Facility::Test, "kept");
        logger.error(Facility::Test, "also kept");

        let messages: Vec<String> = sink.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["kept", "also kept"]);
        assert_eq!(logger.global_level(), Severity::Warning);
    }

    #[test]
    fn test_facility_level_overrides_global() {
        let (logger, sink) = Logger::memory();
        logger.set_global_level(Severity::Error);
        logger.set_facility_level(Facility::FanOut, Severity::Debug);

        logger.debug(Facility::FanOut, "fanout debug");
        logger.debug(Facility::Listener, "listener debug");
        assert_eq!(sink.entries().len(), 1);

        // an override can also be stricter than the global level
        logger.set_facility_level(Facility::Listener, Severity::Critical);
        logger.error(Facility::Listener, "listener error");
        logger.error(Facility::Cli, "cli error");
        assert_eq!(sink.messages_containing("error"), vec!["cli error"]);
    }

    #[test]
    fn test_clones_share_sink_and_levels() {
        let (logger1, sink) = Logger::memory();
        let logger2 = logger1.clone();

        logger1.info(Facility::Test, "From logger1");
        logger2.set_global_level(Severity::Error);
        logger1.info(Facility::Test, "filtered by logger2's level");
        logger2.error(Facility::Test, "From logger2");

        assert_eq!(sink.entries().len(), 2);
    }

    #[test]
    fn test_log_kv() {
        let (logger, sink) = Logger::memory();
        logger.log_kv(
            Severity::Info,
            Facility::Transport,
            "connected",
            &[("dst", "239.1.1.1:5050"), ("mode", "udp")],
        );
        let entries = sink.entries();
        assert_eq!(entries[0].get_kvs().len(), 2);
        assert_eq!(entries[0].get_kvs()[1].value, "udp");
    }
}
