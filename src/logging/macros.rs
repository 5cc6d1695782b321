// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros
//
// Each macro takes a logger, a facility and either a `&str` or `format!`
// arguments:
//
// log_warning!(logger, Facility::FanOut, "send to {} failed: {}", group, err);

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.error($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        $logger.error($facility, &format!($fmt, $($arg)+))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.warning($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        $logger.warning($facility, &format!($fmt, $($arg)+))
    };
}

#[macro_export]
macro_rules! log_notice {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.notice($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        $logger.notice($facility, &format!($fmt, $($arg)+))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.info($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        $logger.info($facility, &format!($fmt, $($arg)+))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.debug($facility, $msg)
    };
    ($logger:expr, $facility:expr, $fmt:expr, $($arg:tt)+) => {
        $logger.debug($facility, &format!($fmt, $($arg)+))
    };
}

/// Log a message with key-value pairs
///
/// ```ignore
/// log_kv!(logger, Severity::Info, Facility::Listener, "bound",
///         "group" => "239.1.1.1", "port" => "5050");
/// ```
#[macro_export]
macro_rules! log_kv {
    ($logger:expr, $severity:expr, $facility:expr, $msg:expr, $($key:expr => $value:expr),+) => {{
        let kvs: &[(&str, &str)] = &[$(($key, $value)),+];
        $logger.log_kv($severity, $facility, $msg, kvs)
    }};
}
