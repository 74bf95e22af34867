//! Frame fixtures and wire builders shared by unit tests, integration tests and benches

#![cfg(any(test, feature = "benchmark"))]

use chrono::{DateTime, TimeZone, Utc};

use crate::ubx::format::{PREAMBLE, clock, gnss_id, sfrbx, timegal};

/// NAV-TIMEGAL captured from a u-blox M8: week 1073, tow 379328, 18 leap seconds.
pub const TIME_FRAME: &[u8] = &[
    0x01, 0x25, 0x14, 0x00, 0x00, 0x16, 0x9C, 0x16, 0xC0, 0xC9, 0x05, 0x00, 0x1C, 0xA4, 0x02, 0x00,
    0x31, 0x04, 0x12, 0x07, 0x03, 0x00, 0x00, 0x00, 0xA3, 0xEF,
];

/// NAV-CLOCK from the same epoch: bias -52610 ns, drift -142 ns/s.
pub const CLOCK_FRAME: &[u8] = &[
    0x01, 0x22, 0x14, 0x00, 0x00, 0x16, 0x9C, 0x16, 0x7E, 0x32, 0xFF, 0xFF, 0x72, 0xFF, 0xFF, 0xFF,
    0x12, 0x00, 0x00, 0x00, 0x9C, 0x01, 0x00, 0x00, 0xCB, 0xDE,
];

/// RXM-SFRBX captured from a u-blox M8: Galileo E18, 9 words.
pub const NAV_FRAME: &[u8] = &[
    0x02, 0x13, 0x2C, 0x00, 0x02, 0x12, 0x01, 0x00, 0x09, 0x0E, 0x02, 0xD2, 0x34, 0x77, 0x76, 0x07,
    0x5D, 0x63, 0x00, 0x01, 0xF5, 0x51, 0x22, 0x24, 0x00, 0x40, 0x0F, 0x7F, 0x00, 0x40, 0x65, 0xA6,
    0x2A, 0x00, 0x00, 0x00, 0xD2, 0x57, 0xAA, 0xAA, 0x00, 0x40, 0xBF, 0x3F, 0xD5, 0x9A, 0xE8, 0x3F,
    0x4A, 0x7C,
];

/// Reordered words of [`NAV_FRAME`].
pub const NAV_FRAME_GALILEO_DATA: &str =
    "077677340100635d242251f57f0f4000a66540000000002aaaaa57d23fbf4000";

/// Reception instant used for fixture frames.
pub fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 3, 19, 9, 21, 50).unwrap()
}

/// Frame bytes as they appear on the wire, preamble included.
pub fn wire(frame: &[u8]) -> Vec<u8> {
    let mut bytes = PREAMBLE.to_vec();
    bytes.extend_from_slice(frame);
    bytes
}

/// [`TIME_FRAME`] carrying another Galileo time.
///
/// The captured checksum is kept; the reader never verifies it.
pub fn time_frame(gal_tow: u32, gal_wno: i16, leap_s: u8) -> Vec<u8> {
    let mut frame = TIME_FRAME.to_vec();
    frame[timegal::GAL_TOW..timegal::GAL_TOW + 4].copy_from_slice(&gal_tow.to_le_bytes());
    frame[timegal::GAL_WNO..timegal::GAL_WNO + 2].copy_from_slice(&gal_wno.to_le_bytes());
    frame[timegal::LEAP_S] = leap_s;
    frame
}

/// [`CLOCK_FRAME`] carrying another bias and drift.
pub fn clock_frame(bias: i32, drift: i32) -> Vec<u8> {
    let mut frame = CLOCK_FRAME.to_vec();
    frame[clock::BIAS..clock::BIAS + 4].copy_from_slice(&bias.to_le_bytes());
    frame[clock::DRIFT..clock::DRIFT + 4].copy_from_slice(&drift.to_le_bytes());
    frame
}

/// [`NAV_FRAME`] relabelled with another satellite and constellation.
pub fn nav_frame(sv_id: u8, gnss: u8) -> Vec<u8> {
    let mut frame = NAV_FRAME.to_vec();
    frame[sfrbx::GNSS_ID] = gnss;
    frame[sfrbx::SV_ID] = sv_id;
    frame
}

/// [`NAV_FRAME`] relabelled with another Galileo satellite.
pub fn galileo_frame(sv_id: u8) -> Vec<u8> {
    nav_frame(sv_id, gnss_id::GALILEO)
}

/// Byte stream as emitted by a receiver right after configuration.
///
/// Starts with a short corrupted candidate and five complete time frames, so a
/// reader in Cleaning state is aligned once they are consumed. The first entry of
/// `frames` follows without its preamble, the rest are framed normally.
pub fn cleaning_stream(frames: &[&[u8]]) -> Vec<u8> {
    let mut stream = vec![0x00, 0x16, 0x9C, 0x16, 0xC0];
    stream.extend_from_slice(&PREAMBLE);
    for _ in 0..5 {
        stream.extend_from_slice(TIME_FRAME);
        stream.extend_from_slice(&PREAMBLE);
    }
    if let Some((first, rest)) = frames.split_first() {
        stream.extend_from_slice(first);
        for frame in rest {
            stream.extend(wire(frame));
        }
    }
    stream
}

/// Concatenated wire frames, as written to a capture file.
pub fn capture(frames: &[&[u8]]) -> Vec<u8> {
    frames.iter().flat_map(|frame| wire(frame)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageKind, RawFrame};

    #[test]
    fn builders_produce_recognised_frames() {
        assert_eq!(RawFrame::new(time_frame(1, 2, 18)).unwrap().kind(), MessageKind::Time);
        assert_eq!(RawFrame::new(clock_frame(1, 2)).unwrap().kind(), MessageKind::Clock);
        assert_eq!(RawFrame::new(galileo_frame(3)).unwrap().kind(), MessageKind::Navigation);
    }

    #[test]
    fn builders_reproduce_captured_frames() {
        assert_eq!(time_frame(379_328, 1073, 18), TIME_FRAME);
        assert_eq!(clock_frame(-52_610, -142), CLOCK_FRAME);
    }
}
