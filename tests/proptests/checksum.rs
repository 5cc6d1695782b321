// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property tests for the Internet checksum.

#[cfg(test)]
mod tests {
    use mcast::checksum::{checksum, is_valid, verification_sum};
    use proptest::prelude::*;

    proptest! {
        /// **Property:** The checksum is never reported as zero.
        #[test]
        fn test_checksum_never_zero(data in any::<Vec<u8>>()) {
            prop_assert_ne!(checksum(&data), 0);
        }

        /// **Property:** Writing the checksum into a zeroed, word-aligned
        /// field makes the whole buffer verify.
        #[test]
        fn test_embedded_checksum_verifies(
            mut data in proptest::collection::vec(any::<u8>(), 2..256),
            slot in any::<prop::sample::Index>(),
        ) {
            if data.len() % 2 == 1 {
                data.push(0);
            }
            let offset = slot.index(data.len() / 2) * 2;
            data[offset] = 0;
            data[offset + 1] = 0;

            let sum = checksum(&data).to_be_bytes();
            data[offset] = sum[0];
            data[offset + 1] = sum[1];

            prop_assert!(is_valid(&data));
            prop_assert_eq!(verification_sum(&data), 0xFFFF);
        }

        /// **Property:** An odd trailing byte is padded with a zero low byte.
        #[test]
        fn test_odd_length_matches_zero_padded(data in proptest::collection::vec(any::<u8>(), 1..128)) {
            let mut padded = data.clone();
            if padded.len() % 2 == 1 {
                padded.push(0);
            }
            prop_assert_eq!(checksum(&data), checksum(&padded));
        }
    }
}
