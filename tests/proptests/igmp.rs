// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property tests for IGMP message parsing.

#[cfg(test)]
mod tests {
    use mcast::protocols::igmp::{IgmpMessage, IgmpType};
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    fn any_type() -> impl Strategy<Value = IgmpType> {
        prop_oneof![
            Just(IgmpType::Query),
            Just(IgmpType::V1Report),
            Just(IgmpType::V2Report),
            Just(IgmpType::Leave),
        ]
    }

    proptest! {
        /// **Property:** Arbitrary bytes never make the parser panic.
        #[test]
        fn test_parse_does_not_panic(input in any::<Vec<u8>>()) {
            let _ = IgmpMessage::parse(&input);
        }

        /// **Property:** Every built message parses back to itself.
        #[test]
        fn test_built_message_parses(msg_type in any_type(), code in any::<u8>(), group in any::<u32>()) {
            let message = IgmpMessage::new(msg_type, code, Ipv4Addr::from(group));
            prop_assert_eq!(IgmpMessage::parse(&message.to_bytes()).unwrap(), message);
        }

        /// **Property:** Flipping any bit of a built message is detected.
        #[test]
        fn test_single_bit_flip_rejected(
            msg_type in any_type(),
            group in any::<u32>(),
            byte in 0usize..8,
            bit in 0u8..8,
        ) {
            let mut wire = IgmpMessage::new(msg_type, 0, Ipv4Addr::from(group)).to_bytes();
            wire[byte] ^= 1 << bit;
            prop_assert!(IgmpMessage::parse(&wire).is_err());
        }
    }
}
