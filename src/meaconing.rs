//! Meaconing detection from receiver clock continuity
//!
//! A relayed or replayed signal shifts the receiver clock. Between two
//! consecutive NAV-CLOCK epochs the bias should either stay within the threshold
//! or jump by one clock wrap (1 ms = 1,000,000 ns), and the drift should stay
//! below the threshold. Anything else is flagged.

use tracing::{debug, warn};

use crate::types::ClockSample;

/// Bias jump produced by a legitimate receiver clock reset.
pub const CLOCK_WRAP_NS: i64 = 1_000_000;

/// Compares each clock sample with the one immediately before it.
#[derive(Debug, Clone)]
pub struct MeaconingDetector {
    threshold: i64,
    previous: Option<ClockSample>,
    attack: bool,
}

impl MeaconingDetector {
    pub fn new(threshold: i64) -> Self {
        Self { threshold, previous: None, attack: false }
    }

    /// Feed one sample and return the updated attack flag.
    ///
    /// The sample always becomes the new reference, even when it is flagged.
    pub fn observe(&mut self, sample: ClockSample) -> bool {
        if let Some(previous) = self.previous {
            let was_attack = self.attack;
            self.attack = !self.is_consistent(previous, sample);

            if self.attack && !was_attack {
                warn!(
                    bias = sample.bias,
                    drift = sample.drift,
                    previous_bias = previous.bias,
                    "Clock discontinuity detected, flagging meaconing"
                );
            } else if !self.attack && was_attack {
                debug!("Clock continuity restored");
            }
        }
        self.previous = Some(sample);
        self.attack
    }

    fn is_consistent(&self, previous: ClockSample, current: ClockSample) -> bool {
        let t = self.threshold;
        let delta = (i64::from(current.bias) - i64::from(previous.bias)).abs();
        let within_step = delta < t;
        let within_wrap = CLOCK_WRAP_NS - t < delta && delta < CLOCK_WRAP_NS + t;
        i64::from(current.drift) < t && (within_step || within_wrap)
    }

    pub fn is_attack(&self) -> bool {
        self.attack
    }

    pub fn previous(&self) -> Option<ClockSample> {
        self.previous
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_sample_only_primes_the_detector() {
        let mut detector = MeaconingDetector::new(50);
        assert!(!detector.observe(ClockSample::new(100_000, 10_000)));
        assert_eq!(detector.previous(), Some(ClockSample::new(100_000, 10_000)));
    }

    #[test]
    fn bias_jump_outside_both_bands_is_an_attack() {
        let mut detector = MeaconingDetector::new(50);
        detector.observe(ClockSample::new(100, 10));
        assert!(!detector.observe(ClockSample::new(100, 10)));
        assert!(detector.observe(ClockSample::new(100_000, 10)));
        assert!(detector.is_attack());
    }

    #[test]
    fn clock_wrap_is_consistent() {
        let mut detector = MeaconingDetector::new(50);
        detector.observe(ClockSample::new(0, 10));
        assert!(!detector.observe(ClockSample::new(1_000_010, 10)));
        assert!(!detector.observe(ClockSample::new(20, 10)));
    }

    #[test]
    fn excessive_drift_is_an_attack() {
        let mut detector = MeaconingDetector::new(50);
        detector.observe(ClockSample::new(100, 10));
        assert!(detector.observe(ClockSample::new(100, 50)));
    }

    #[test]
    fn comparison_is_against_the_immediately_preceding_sample() {
        let mut detector = MeaconingDetector::new(50);
        detector.observe(ClockSample::new(100, 10));
        assert!(detector.observe(ClockSample::new(100_000, 10)));
        // Close to the flagged sample, far from the last good one.
        assert!(!detector.observe(ClockSample::new(100_010, 10)));
    }

    proptest! {
        #[test]
        fn bias_delta_is_symmetric(a in any::<i32>(), b in any::<i32>(), threshold in 1i64..2_000_000) {
            let mut forward = MeaconingDetector::new(threshold);
            forward.observe(ClockSample::new(a, 0));
            let mut backward = MeaconingDetector::new(threshold);
            backward.observe(ClockSample::new(b, 0));
            prop_assert_eq!(
                forward.observe(ClockSample::new(b, 0)),
                backward.observe(ClockSample::new(a, 0))
            );
        }

        #[test]
        fn steady_clock_never_flags(bias in any::<i32>(), drift in -1000i32..1000, count in 2usize..20) {
            let mut detector = MeaconingDetector::new(1001);
            for _ in 0..count {
                prop_assert!(!detector.observe(ClockSample::new(bias, drift)));
            }
        }
    }
}
