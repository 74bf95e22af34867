//! Forward error correction encoder for Galileo page validation
//!
//! Re-creates the symbol stream a Galileo I/NAV page part is broadcast with, so
//! extracted words can later be compared against independently demodulated
//! symbols:
//!
//! 1. rate-1/2 convolutional code, constraint length 7, `G2` output inverted
//! 2. 8 x 30 block interleaver (written by column, read by row)
//! 3. 10-bit synchronization pattern prepended
//! 4. zero padding up to 256 bits
//!
//! Bits are taken from and packed into bytes most significant bit first.

/// Input chunk size in bits.
pub const INPUT_BITS: usize = 120;

/// Input chunk size in bytes.
pub const INPUT_BYTES: usize = INPUT_BITS / 8;

/// Symbols produced by the rate-1/2 encoder.
pub const ENCODED_BITS: usize = INPUT_BITS * 2;

pub const INTERLEAVER_ROWS: usize = 8;
pub const INTERLEAVER_COLS: usize = 30;

/// Page synchronization pattern.
pub const SYNC_PATTERN: [u8; 10] = [0, 1, 0, 1, 1, 0, 0, 0, 0, 0];

/// Output frame size in bits.
pub const FRAME_BITS: usize = 256;

/// Output frame size in bytes.
pub const FRAME_BYTES: usize = FRAME_BITS / 8;

/// Generator taps; index 0 applies to the incoming bit, 1..=6 to the register.
const G1: [u8; 7] = [1, 1, 1, 1, 0, 0, 1];
const G2: [u8; 7] = [1, 0, 1, 1, 0, 1, 1];

const MEMORY: usize = G1.len() - 1;

/// Stateless convolutional encoder and interleaver.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConvolutionalCodec;

impl ConvolutionalCodec {
    /// Encode one 120-bit chunk into a 256-bit frame.
    pub fn encode(input: &[u8; INPUT_BYTES]) -> [u8; FRAME_BYTES] {
        let symbols = interleave(&convolve(&unpack_bits(input)));

        let mut frame = Vec::with_capacity(FRAME_BITS);
        frame.extend_from_slice(&SYNC_PATTERN);
        frame.extend_from_slice(&symbols);
        frame.resize(FRAME_BITS, 0);

        pack_bits(&frame)
    }

    /// Hex form of [`ConvolutionalCodec::encode`].
    pub fn encode_hex(input: &[u8; INPUT_BYTES]) -> String {
        hex::encode(Self::encode(input))
    }
}

fn unpack_bits(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1)).collect()
}

fn pack_bits(bits: &[u8]) -> [u8; FRAME_BYTES] {
    let mut out = [0u8; FRAME_BYTES];
    for (byte, chunk) in out.iter_mut().zip(bits.chunks(8)) {
        *byte = chunk.iter().fold(0, |acc, &bit| (acc << 1) | bit);
    }
    out
}

fn convolve(bits: &[u8]) -> Vec<u8> {
    let mut register = [0u8; MEMORY];
    let mut out = Vec::with_capacity(bits.len() * 2);

    for &bit in bits {
        let mut out1 = bit & G1[0];
        let mut out2 = bit & G2[0];
        for (i, &state) in register.iter().enumerate() {
            out1 ^= state & G1[i + 1];
            out2 ^= state & G2[i + 1];
        }
        out.push(out1);
        out.push(out2 ^ 1);

        register.rotate_right(1);
        register[0] = bit;
    }

    out
}

fn interleave(symbols: &[u8]) -> Vec<u8> {
    debug_assert_eq!(symbols.len(), INTERLEAVER_ROWS * INTERLEAVER_COLS);
    let mut out = Vec::with_capacity(symbols.len());
    for row in 0..INTERLEAVER_ROWS {
        for col in 0..INTERLEAVER_COLS {
            out.push(symbols[col * INTERLEAVER_ROWS + row]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_chunk_known_answer() {
        // All-zero input: G1 symbols stay 0, inverted G2 symbols stay 1, so
        // interleaver rows alternate between 30 zeros and 30 ones.
        assert_eq!(
            ConvolutionalCodec::encode_hex(&[0; INPUT_BYTES]),
            "5800000000fffffffc0000000fffffffc0000000fffffffc0000000fffffffc0"
        );
    }

    #[test]
    fn encoder_emits_two_symbols_per_bit() {
        let bits = unpack_bits(&[0xA5; INPUT_BYTES]);
        assert_eq!(bits.len(), INPUT_BITS);
        assert_eq!(convolve(&bits).len(), ENCODED_BITS);
    }

    #[test]
    fn single_bit_impulse_follows_generators() {
        let mut bits = vec![0u8; 8];
        bits[0] = 1;
        let symbols = convolve(&bits);
        let g1: Vec<u8> = symbols.iter().step_by(2).copied().collect();
        let g2: Vec<u8> = symbols.iter().skip(1).step_by(2).map(|s| s ^ 1).collect();
        assert_eq!(&g1[..7], &G1);
        assert_eq!(&g2[..7], &G2);
        assert_eq!(g1[7], 0);
    }

    #[test]
    fn interleaver_reads_rows_of_a_column_major_matrix() {
        let symbols: Vec<u8> = (0..ENCODED_BITS).map(|i| (i % 2) as u8).collect();
        let out = interleave(&symbols);
        assert!(out[..INTERLEAVER_COLS].iter().all(|&s| s == 0));
        assert!(out[INTERLEAVER_COLS..2 * INTERLEAVER_COLS].iter().all(|&s| s == 1));
    }

    #[test]
    fn frame_starts_with_sync_pattern() {
        let frame = ConvolutionalCodec::encode(&[0x3C; INPUT_BYTES]);
        let bits = unpack_bits(&frame);
        assert_eq!(&bits[..SYNC_PATTERN.len()], &SYNC_PATTERN);
        assert!(bits[SYNC_PATTERN.len() + ENCODED_BITS..].iter().all(|&b| b == 0));
    }

    proptest! {
        #[test]
        fn output_is_fixed_size_and_deterministic(input in any::<[u8; INPUT_BYTES]>()) {
            let first = ConvolutionalCodec::encode_hex(&input);
            let second = ConvolutionalCodec::encode_hex(&input);
            prop_assert_eq!(first.len(), FRAME_BYTES * 2);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn bit_packing_round_trips(input in any::<[u8; FRAME_BYTES]>()) {
            prop_assert_eq!(pack_bits(&unpack_bits(&input)), input);
        }
    }
}
