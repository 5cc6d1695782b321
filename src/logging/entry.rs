// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log entry structure

use super::{Facility, Severity};
use chrono::{DateTime, Utc};

/// Key-value pair for structured logging
#[derive(Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl std::fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// One log record as handed to a sink
#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub facility: Facility,
    pub message: String,
    pub kvs: Vec<KeyValue>,
}

impl LogEntry {
    pub fn new(severity: Severity, facility: Facility, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            severity,
            facility,
            message: message.to_string(),
            kvs: Vec::new(),
        }
    }

    pub fn add_kv(&mut self, key: &str, value: &str) {
        self.kvs.push(KeyValue::new(key, value));
    }

    pub fn get_kvs(&self) -> &[KeyValue] {
        &self.kvs
    }

    /// `[SEVERITY] [Facility] message key=value ...`
    pub fn to_text(&self) -> String {
        let mut line = format!(
            "[{}] [{}] {}",
            self.severity,
            self.facility.as_str(),
            self.message
        );
        for kv in &self.kvs {
            line.push_str(&format!(" {:?}", kv));
        }
        line
    }

    /// One JSON object per entry, as consumed by log shippers
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "level": self.severity.as_str(),
            "facility": self.facility.as_str(),
            "message": self.message,
        });
        if !self.kvs.is_empty() {
            let fields: serde_json::Map<String, serde_json::Value> = self
                .kvs
                .iter()
                .map(|kv| (kv.key.clone(), serde_json::Value::String(kv.value.clone())))
                .collect();
            value["fields"] = serde_json::Value::Object(fields);
        }
        value
    }
}

impl std::fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("LogEntry");
        debug
            .field("severity", &self.severity)
            .field("facility", &self.facility)
            .field("message", &self.message);

        if !self.kvs.is_empty() {
            debug.field("kvs", &self.kvs);
        }

        debug.finish()
    }
}
