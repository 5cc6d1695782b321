// SPDX-License-Identifier: Apache-2.0 OR MIT
// Output sinks for log entries

use super::entry::LogEntry;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Output sink for log entries
pub trait LogSink: Send + Sync {
    fn write_entry(&self, entry: &LogEntry);
}

/// Human-readable lines on stderr
#[derive(Default)]
pub struct TextSink;

impl LogSink for TextSink {
    fn write_entry(&self, entry: &LogEntry) {
        let _ = writeln!(std::io::stderr().lock(), "{}", entry.to_text());
    }
}

/// JSON lines on stderr
#[derive(Default)]
pub struct JsonSink;

impl LogSink for JsonSink {
    fn write_entry(&self, entry: &LogEntry) {
        let _ = writeln!(std::io::stderr().lock(), "{}", entry.to_json());
    }
}

/// Keeps every entry in memory; clones share the same buffer
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages containing `needle`, in arrival order
    pub fn messages_containing(&self, needle: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.message.contains(needle))
            .map(|e| e.message)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write_entry(&self, entry: &LogEntry) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(entry.clone());
    }
}
