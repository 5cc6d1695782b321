// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property tests for CIDR expansion.

#[cfg(test)]
mod tests {
    use mcast::address_range::{ipv4_to_u32, u32_to_ipv4, AddressRange};
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    proptest! {
        #[test]
        fn test_u32_round_trip(value in any::<u32>()) {
            prop_assert_eq!(ipv4_to_u32(u32_to_ipv4(value)), value);
        }

        /// **Property:** A /n block holds 2^(32-n) addresses, each one
        /// greater than the last, all inside the block.
        #[test]
        fn test_expansion_is_ordered_and_complete(raw in any::<u32>(), prefix_len in 20u8..=32) {
            let range = AddressRange::new(Ipv4Addr::from(raw), prefix_len).unwrap();
            let addresses: Vec<u32> = range.iter().map(ipv4_to_u32).collect();

            prop_assert_eq!(addresses.len() as u64, range.len());
            prop_assert_eq!(range.len(), 1u64 << (32 - prefix_len));
            prop_assert!(addresses.windows(2).all(|w| w[1] == w[0] + 1));
            prop_assert_eq!(u32_to_ipv4(addresses[0]), range.first());
            prop_assert_eq!(u32_to_ipv4(*addresses.last().unwrap()), range.last());
            prop_assert!(range.contains(Ipv4Addr::from(raw)));
        }

        /// **Property:** Wide blocks are described without being walked.
        #[test]
        fn test_wide_blocks_are_lazy(raw in any::<u32>(), prefix_len in 0u8..=8) {
            let range = AddressRange::new(Ipv4Addr::from(raw), prefix_len).unwrap();
            prop_assert_eq!(range.iter().len() as u64, range.len());
            prop_assert_eq!(range.get(range.len() - 1), Some(range.last()));
            prop_assert_eq!(range.get(range.len()), None);
        }

        /// **Property:** Parsing a rendered block gives the same block.
        #[test]
        fn test_display_parses_back(raw in any::<u32>(), prefix_len in 0u8..=32) {
            let range = AddressRange::new(Ipv4Addr::from(raw), prefix_len).unwrap();
            prop_assert_eq!(AddressRange::parse(&range.to_string()).unwrap(), range);
        }

        /// **Property:** Prefixes above 32 are always rejected.
        #[test]
        fn test_prefix_over_32_rejected(raw in any::<u32>(), prefix_len in 33u8..) {
            let text = format!("{}/{}", Ipv4Addr::from(raw), prefix_len);
            prop_assert!(AddressRange::parse(&text).is_err());
        }
    }
}
