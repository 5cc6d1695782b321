// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Internet checksum (RFC 1071) used for IGMP messages and IPv4 headers.

/// Compute the 16-bit one's complement checksum of `data`.
///
/// The buffer is summed as big-endian 16-bit words; an odd trailing byte is
/// the high byte of a word whose low byte is zero. A result of `0x0000` is
/// reported as `0xFFFF` (RFC 768: all-zero means "no checksum").
pub fn checksum(data: &[u8]) -> u16 {
    let csum = !fold(sum_words(data));
    if csum == 0 {
        0xFFFF
    } else {
        csum
    }
}

/// Checksum split into (high, low) bytes, ready to be written into a header.
pub fn checksum_bytes(data: &[u8]) -> [u8; 2] {
    checksum(data).to_be_bytes()
}

/// Folded one's complement sum of `data` without the final complement.
///
/// A buffer that carries a correct embedded checksum folds to `0xFFFF`.
pub fn verification_sum(data: &[u8]) -> u16 {
    fold(sum_words(data))
}

/// Check a buffer whose checksum field is already filled in.
pub fn is_valid(data: &[u8]) -> bool {
    verification_sum(data) == 0xFFFF
}

fn sum_words(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([chunk[0], chunk[1]]) as u32);
        // keep headroom so a later fold cannot lose carries
        if sum > 0xFFFF_0000 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
    }
    if let Some(&byte) = chunks.remainder().first() {
        sum = sum.wrapping_add((byte as u32) << 8);
    }
    sum
}

fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}
