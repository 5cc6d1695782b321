// SPDX-License-Identifier: Apache-2.0 OR MIT
//! CIDR expansion for fan-out operations.
//!
//! An [`AddressRange`] is every address of an IPv4 block in ascending order,
//! network and broadcast addresses included. Callers that only want host
//! addresses must trim the ends themselves. The range is lazy: a /8 is a base
//! and a length, not sixteen million `Ipv4Addr`s.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{McastError, Result};

/// Prefix length used when an address carries no `/` suffix
pub const HOST_PREFIX_LEN: u8 = 32;

/// Ordered, immutable IPv4 address block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    base: u32,
    prefix_len: u8,
}

impl AddressRange {
    /// Block containing `network` with the given prefix length.
    ///
    /// `network` need not be the base address; host bits are masked off.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(McastError::InvalidPrefixLength(prefix_len.to_string()));
        }
        Ok(Self {
            base: ipv4_to_u32(network) & netmask(prefix_len),
            prefix_len,
        })
    }

    /// Single-address range (/32)
    pub fn single(address: Ipv4Addr) -> Self {
        Self {
            base: ipv4_to_u32(address),
            prefix_len: HOST_PREFIX_LEN,
        }
    }

    /// Parse `a.b.c.d` or `a.b.c.d/len`
    pub fn parse(cidr: &str) -> Result<Self> {
        let (network, prefix_len) = split_cidr(cidr)?;
        expand(network, prefix_len)
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of addresses in the block: 2^(32 - prefix_len)
    pub fn len(&self) -> u64 {
        1u64 << (32 - self.prefix_len as u32)
    }

    /// Always false: the smallest block (/32) holds one address.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Network address (index 0)
    pub fn first(&self) -> Ipv4Addr {
        u32_to_ipv4(self.base)
    }

    /// Broadcast address (last index)
    pub fn last(&self) -> Ipv4Addr {
        u32_to_ipv4(self.base | !netmask(self.prefix_len))
    }

    /// Address at `index`, or `None` past the end of the block
    pub fn get(&self, index: u64) -> Option<Ipv4Addr> {
        if index < self.len() {
            Some(u32_to_ipv4(self.base | index as u32))
        } else {
            None
        }
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        ipv4_to_u32(address) & netmask(self.prefix_len) == self.base
    }

    pub fn iter(&self) -> AddressIter {
        AddressIter {
            base: self.base,
            next: 0,
            end: self.len(),
        }
    }

    /// Materialise the whole block. Avoid for short prefixes.
    pub fn to_vec(&self) -> Vec<Ipv4Addr> {
        self.iter().collect()
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first(), self.prefix_len)
    }
}

impl IntoIterator for AddressRange {
    type Item = Ipv4Addr;
    type IntoIter = AddressIter;

    fn into_iter(self) -> AddressIter {
        self.iter()
    }
}

impl IntoIterator for &AddressRange {
    type Item = Ipv4Addr;
    type IntoIter = AddressIter;

    fn into_iter(self) -> AddressIter {
        self.iter()
    }
}

/// Ascending iterator over an [`AddressRange`]
#[derive(Debug, Clone)]
pub struct AddressIter {
    base: u32,
    next: u64,
    end: u64,
}

impl Iterator for AddressIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        if self.next >= self.end {
            return None;
        }
        let address = u32_to_ipv4(self.base | self.next as u32);
        self.next += 1;
        Some(address)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for AddressIter {
    fn next_back(&mut self) -> Option<Ipv4Addr> {
        if self.next >= self.end {
            return None;
        }
        self.end -= 1;
        Some(u32_to_ipv4(self.base | self.end as u32))
    }
}

impl ExactSizeIterator for AddressIter {}

/// Expand a network string and prefix length into its address block.
///
/// Fails with `InvalidNetworkFormat` when `network` is not an IPv4 literal and
/// `InvalidPrefixLength` when `prefix_len` is outside 0..=32.
pub fn expand(network: &str, prefix_len: u8) -> Result<AddressRange> {
    let address: Ipv4Addr = network
        .trim()
        .parse()
        .map_err(|_| McastError::InvalidNetworkFormat(network.to_string()))?;
    AddressRange::new(address, prefix_len)
}

/// Split `a.b.c.d/len` into its parts; a missing suffix means /32.
pub fn split_cidr(address: &str) -> Result<(&str, u8)> {
    match address.split_once('/') {
        None => Ok((address, HOST_PREFIX_LEN)),
        Some((network, prefix)) => {
            let prefix_len: u8 = prefix
                .trim()
                .parse()
                .map_err(|_| McastError::InvalidPrefixLength(prefix.to_string()))?;
            if prefix_len > 32 {
                return Err(McastError::InvalidPrefixLength(prefix.to_string()));
            }
            Ok((network, prefix_len))
        }
    }
}

/// True when `address` uses CIDR notation
pub fn is_cidr(address: &str) -> bool {
    address.contains('/')
}

#[inline]
pub fn ipv4_to_u32(address: Ipv4Addr) -> u32 {
    u32::from_be_bytes(address.octets())
}

#[inline]
pub fn u32_to_ipv4(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value.to_be_bytes())
}

#[inline]
fn netmask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len as u32)
    }
}
