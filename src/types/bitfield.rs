//! Bit-level field extraction for Galileo subframe words

use crate::ubx::format::sfrbx;

/// Low bits kept before the reserved gap.
const AUTH_LOW_BITS: u32 = 14;

/// First bit position after the reserved gap (bits 14..=37 are dropped).
const AUTH_HIGH_START: u32 = 38;

const AUTH_LOW_MASK: u64 = (1 << AUTH_LOW_BITS) - 1;

/// Number of authentication bits recovered.
pub const AUTH_BITS: u32 = 40;

/// Extract the 40 authentication bits from 8 subframe bytes.
///
/// The bytes are read as one little-endian 64-bit value (bit 0 is the least
/// significant bit of byte 0). Bits 14 through 37 carry unrelated data and are
/// removed; the remaining 40 bits keep their relative order with the gap closed.
pub fn extract_auth_bits(bytes: &[u8; sfrbx::AUTH_LEN]) -> u64 {
    let raw = u64::from_le_bytes(*bytes);
    let low = raw & AUTH_LOW_MASK;
    let high = raw >> AUTH_HIGH_START;
    low | (high << AUTH_LOW_BITS)
}

/// Reverse the byte order of each of the 8 subframe words, keeping word order.
///
/// Applying this twice returns the input.
pub fn reorder_words(bytes: &[u8; sfrbx::WORDS_LEN]) -> [u8; sfrbx::WORDS_LEN] {
    let mut out = [0u8; sfrbx::WORDS_LEN];
    for (dst, src) in out.chunks_exact_mut(4).zip(bytes.chunks_exact(4)) {
        dst.copy_from_slice(src);
        dst.reverse();
    }
    out
}

/// Hex form of [`reorder_words`].
// Words 4 and 8 are described as padding by some receiver documentation but
// are kept here; every word is byte-reversed and nothing is dropped.
pub fn extract_word_reordered(bytes: &[u8; sfrbx::WORDS_LEN]) -> String {
    hex::encode(reorder_words(bytes))
}
