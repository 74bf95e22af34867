//! Galileo time context derived from NAV-TIMEGAL messages

use serde::{Deserialize, Serialize};

use super::RawFrame;
use crate::ubx::format::timegal;

/// Seconds in one GNSS week.
pub const SECONDS_PER_WEEK: i64 = 604_800;

/// Galileo System Time start (1999-08-22T00:00:00Z) in unix milliseconds.
pub const GALILEO_EPOCH_UNIX_MS: i64 = 935_280_000_000;

/// Correction applied to computed timestamps to account for reception latency.
pub trait LatencyCorrection: Send + Sync + std::fmt::Debug {
    fn adjust(&self, value: i64) -> i64;
}

/// Empirical correction: even values move back 3 units, odd values 2.
///
/// The receiver emits messages on alternating even and odd seconds; the offsets
/// were measured on one deployment and have not been verified against a
/// reference clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParityLatency;

impl LatencyCorrection for ParityLatency {
    fn adjust(&self, value: i64) -> i64 {
        if value % 2 == 0 { value - 3 } else { value - 2 }
    }
}

/// Time fields of the latest NAV-TIMEGAL message.
///
/// Navigation records copy this context at dispatch time, so a later time
/// message never changes a record already handed to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeContext {
    /// Wall clock when the time message was read, unix milliseconds.
    pub reception_time_ms: i64,
    pub gal_tow: u32,
    pub gal_wno: i16,
    pub leap_s: u8,
    pub checksum_a: u8,
    pub checksum_b: u8,
    pub unix_timestamp_ms: i64,
    pub galileo_timestamp_s: i64,
    /// Galileo timestamp of the first time message since startup.
    pub first_galileo_timestamp_s: i64,
}

impl TimeContext {
    /// Decode a NAV-TIMEGAL frame. Returns `None` when the frame is too short.
    ///
    /// `first_galileo_timestamp_s` is the latched value from an earlier message,
    /// or `None` when this is the first one.
    pub fn from_frame(
        frame: &RawFrame,
        latency: &dyn LatencyCorrection,
        first_galileo_timestamp_s: Option<i64>,
    ) -> Option<Self> {
        let data = frame.as_bytes();
        if data.len() < timegal::MIN_LEN {
            return None;
        }

        let gal_tow = u32::from_le_bytes(data[timegal::GAL_TOW..timegal::GAL_TOW + 4].try_into().ok()?);
        let gal_wno = i16::from_le_bytes(data[timegal::GAL_WNO..timegal::GAL_WNO + 2].try_into().ok()?);
        let leap_s = data[timegal::LEAP_S];

        let galileo_seconds = i64::from(gal_wno) * SECONDS_PER_WEEK + i64::from(gal_tow);
        let galileo_timestamp_s = latency.adjust(galileo_seconds);
        let unix_timestamp_ms = latency
            .adjust(galileo_seconds * 1000 + GALILEO_EPOCH_UNIX_MS - i64::from(leap_s) * 1000);

        Some(Self {
            reception_time_ms: frame.received_at().timestamp_millis(),
            gal_tow,
            gal_wno,
            leap_s,
            checksum_a: data[timegal::CK_A],
            checksum_b: data[timegal::CK_B],
            unix_timestamp_ms,
            galileo_timestamp_s,
            first_galileo_timestamp_s: first_galileo_timestamp_s.unwrap_or(galileo_timestamp_s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TIME_FRAME, fixed_instant};

    #[test]
    fn parity_rule_matches_fixture_timestamps() {
        let policy = ParityLatency;
        let galileo = 1073 * SECONDS_PER_WEEK + 379_328;
        assert_eq!(policy.adjust(galileo), 649_329_725);
        assert_eq!(
            policy.adjust(galileo * 1000 + GALILEO_EPOCH_UNIX_MS - 18 * 1000),
            1_584_609_709_997
        );
        assert_eq!(policy.adjust(7), 5);
        assert_eq!(policy.adjust(-7), -9);
    }

    #[test]
    fn decodes_fixture_time_message() {
        let frame = RawFrame::received(TIME_FRAME.to_vec(), fixed_instant()).unwrap();
        let time = TimeContext::from_frame(&frame, &ParityLatency, None).unwrap();

        assert_eq!(time.gal_tow, 379_328);
        assert_eq!(time.gal_wno, 1073);
        assert_eq!(time.leap_s, 18);
        assert_eq!(time.checksum_a, 163);
        assert_eq!(time.checksum_b, 239);
        assert_eq!(time.galileo_timestamp_s, 649_329_725);
        assert_eq!(time.unix_timestamp_ms, 1_584_609_709_997);
        assert_eq!(time.first_galileo_timestamp_s, 649_329_725);
        assert_eq!(time.reception_time_ms, fixed_instant().timestamp_millis());
    }

    #[test]
    fn first_timestamp_is_carried_forward() {
        let frame = RawFrame::received(TIME_FRAME.to_vec(), fixed_instant()).unwrap();
        let time = TimeContext::from_frame(&frame, &ParityLatency, Some(1)).unwrap();
        assert_eq!(time.first_galileo_timestamp_s, 1);
    }

    #[test]
    fn short_frame_is_rejected() {
        let frame = RawFrame::new(TIME_FRAME[..20].to_vec()).unwrap();
        assert!(TimeContext::from_frame(&frame, &ParityLatency, None).is_none());
    }

    #[derive(Debug)]
    struct NoCorrection;

    impl LatencyCorrection for NoCorrection {
        fn adjust(&self, value: i64) -> i64 {
            value
        }
    }

    #[test]
    fn latency_policy_is_replaceable() {
        let frame = RawFrame::received(TIME_FRAME.to_vec(), fixed_instant()).unwrap();
        let time = TimeContext::from_frame(&frame, &NoCorrection, None).unwrap();
        assert_eq!(time.galileo_timestamp_s, 649_329_728);
        assert_eq!(time.unix_timestamp_ms, 1_584_609_710_000);
    }
}
