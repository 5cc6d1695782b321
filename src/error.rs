// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Error taxonomy shared by every mcast component.
//!
//! Address expansion and configuration setters fail synchronously before any
//! socket exists. Transports and listeners surface I/O failures to their
//! immediate caller; nothing in the library retries.

use std::io;
use thiserror::Error;

/// Errors returned by the mcast library
#[derive(Error, Debug)]
pub enum McastError {
    #[error("invalid network address '{0}': expected an IPv4 literal")]
    InvalidNetworkFormat(String),

    #[error("invalid prefix length '{0}': expected an integer in 0..=32")]
    InvalidPrefixLength(String),

    #[error("failed to resolve address '{address}': {source}")]
    AddressResolution {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Socket {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl McastError {
    /// Build a `map_err` adapter that wraps an `io::Error` with socket context.
    ///
    /// ```ignore
    /// socket.connect(&addr).map_err(McastError::socket("connect UDP socket"))?;
    /// ```
    pub fn socket(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| McastError::Socket { context, source }
    }

    /// Address resolution failure that did not originate from the OS resolver
    pub fn unresolved(address: impl Into<String>, reason: &str) -> Self {
        McastError::AddressResolution {
            address: address.into(),
            source: io::Error::new(io::ErrorKind::NotFound, reason.to_string()),
        }
    }

    /// True for failures that happen before any network activity.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            McastError::InvalidNetworkFormat(_)
                | McastError::InvalidPrefixLength(_)
                | McastError::ConfigurationConflict(_)
                | McastError::UnsupportedOperation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, McastError>;
