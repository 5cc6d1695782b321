// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Shared validation utilities for configuration and command-line checks.
//!
//! Validators return `Err(reason)`; callers wrap the reason in their own
//! error type (`ConfigError` for the file, `McastError` at run time).

/// Maximum interface name length (Linux IFNAMSIZ - 1)
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Result type for validation functions
pub type ValidationResult = Result<(), String>;

/// Validate an interface name according to Linux kernel rules.
///
/// # Rules
/// - Must not be empty
/// - Must not exceed 15 characters (IFNAMSIZ - 1)
/// - Must contain only alphanumeric characters, dash, underscore, or dot
/// - Must not start with a digit, dash, or dot
pub fn validate_interface_name(name: &str) -> ValidationResult {
    if name.is_empty() {
        return Err("interface name cannot be empty".to_string());
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(format!(
            "interface name '{}' exceeds maximum length of {} characters",
            name, MAX_INTERFACE_NAME_LEN
        ));
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(format!(
                "interface name '{}' contains invalid character '{}' at position {}; \
                only alphanumeric, dash, underscore, and dot are allowed",
                name, c, i
            ));
        }
    }

    if let Some(first) = name.chars().next() {
        if first.is_ascii_digit() {
            return Err(format!(
                "interface name '{}' cannot start with a digit",
                name
            ));
        }
        if first == '-' || first == '.' {
            return Err(format!(
                "interface name '{}' cannot start with '{}'",
                name, first
            ));
        }
    }

    Ok(())
}

/// Validate a port number.
///
/// Port 0 is rejected as it typically indicates a configuration error.
pub fn validate_port(port: u16, context: &str) -> ValidationResult {
    if port == 0 {
        return Err(format!(
            "{} cannot be 0; valid port range is 1-65535",
            context
        ));
    }
    Ok(())
}

/// A local address must name its port explicitly (`host:port`).
pub fn validate_local_address(local: &str) -> ValidationResult {
    match local.rsplit_once(':') {
        None => Err(format!(
            "local address '{}' must include a port (host:port)",
            local
        )),
        Some((host, _)) if host.is_empty() => {
            Err(format!("local address '{}' is missing a host", local))
        }
        Some((_, port)) => match port.parse::<u16>() {
            Ok(_) => Ok(()),
            Err(_) => Err(format!("local address '{}' has invalid port '{}'", local, port)),
        },
    }
}

/// A fan-out of `width` addresses must fit under `limit`.
pub fn validate_fan_out_width(width: u64, limit: u64, context: &str) -> ValidationResult {
    if width > limit {
        return Err(format!(
            "{} expands to {} addresses; the limit is {}",
            context, width, limit
        ));
    }
    Ok(())
}

/// Padding, when set, must hold the whole message.
pub fn validate_padding(padding: usize, message_len: usize) -> ValidationResult {
    if padding > 0 && padding < message_len {
        return Err(format!(
            "padding {} is shorter than the {}-byte message",
            padding, message_len
        ));
    }
    Ok(())
}

/// Limits must be non-zero.
pub fn validate_nonzero(value: u64, context: &str) -> ValidationResult {
    if value == 0 {
        return Err(format!("{} must be at least 1", context));
    }
    Ok(())
}
