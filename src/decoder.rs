//! Message decoder
//!
//! [`MessageDecoder`] owns every piece of mutable decode state: the latest
//! [`TimeContext`] and the [`MeaconingDetector`]. Time and clock messages update
//! that state in place. Navigation messages are turned into a self-contained
//! [`NavigationJob`] that carries a copy of the time context, so the CPU-bound
//! part of the decode can run on a worker while the next frames are dispatched.
//!
//! ## Usage Example
//!
//! ```rust
//! use ublox_reader::decoder::{Dispatch, MessageDecoder};
//! use ublox_reader::types::RawFrame;
//!
//! let mut decoder = MessageDecoder::new("ITA", 50);
//! let frame = RawFrame::new(vec![0x02, 0x13, 0x00, 0x00, 0x02, 0x12, 0x00, 0x00]).unwrap();
//!
//! // Navigation data before any time message is skipped.
//! assert!(matches!(decoder.dispatch(frame), Dispatch::Skipped(_)));
//! ```

use chrono::Datelike;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec::{ConvolutionalCodec, INPUT_BYTES};
use crate::meaconing::MeaconingDetector;
use crate::types::{
    AUTHENTICITY_ATTACK, AUTHENTICITY_UNRESOLVED, ClockSample, LatencyCorrection, MessageKind,
    NavigationRecord, ParityLatency, RawFrame, TimeContext, ValidatedSample, extract_auth_bits,
    reorder_words, table_name,
};
use crate::ubx::format::{clock, sfrbx};
use crate::{ReaderError, Result};

/// Outcome of dispatching one frame.
#[derive(Debug)]
pub enum Dispatch {
    /// Time context replaced.
    Time(TimeContext),
    /// Clock sample fed to the detector.
    Clock { sample: ClockSample, attack: bool },
    /// Navigation data ready to be decoded.
    Navigation(NavigationJob),
    Skipped(SkipReason),
}

/// Why a frame produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unrecognized { class_id: u8, type_id: u8 },
    OtherConstellation(u8),
    /// Clock or navigation data arrived before the first time message.
    AwaitingTime,
    /// Frame too short for the fields its type carries.
    Truncated,
}

/// Single-owner decode state.
#[derive(Debug)]
pub struct MessageDecoder {
    nation: Arc<str>,
    latency: Arc<dyn LatencyCorrection>,
    detector: MeaconingDetector,
    time: Option<TimeContext>,
    validate: bool,
}

impl MessageDecoder {
    pub fn new(nation: impl Into<Arc<str>>, threshold: i64) -> Self {
        Self {
            nation: nation.into(),
            latency: Arc::new(ParityLatency),
            detector: MeaconingDetector::new(threshold),
            time: None,
            validate: false,
        }
    }

    /// Replace the reception latency policy.
    pub fn with_latency(mut self, latency: Arc<dyn LatencyCorrection>) -> Self {
        self.latency = latency;
        self
    }

    /// Produce encoded validation samples alongside navigation records.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Classify a frame and apply it to the decode state.
    pub fn dispatch(&mut self, frame: RawFrame) -> Dispatch {
        match frame.kind() {
            MessageKind::Time => self.apply_time(&frame),
            MessageKind::Clock => self.apply_clock(&frame),
            MessageKind::Navigation => self.prepare_navigation(frame),
            MessageKind::OtherConstellation(code) => {
                Dispatch::Skipped(SkipReason::OtherConstellation(code))
            }
            MessageKind::Unknown { class_id, type_id } => {
                trace!("Skipping unrecognized message {:#04x}/{:#04x}", class_id, type_id);
                Dispatch::Skipped(SkipReason::Unrecognized { class_id, type_id })
            }
        }
    }

    /// Dispatch and run any navigation job inline.
    pub fn decode(&mut self, frame: RawFrame) -> Result<Option<NavigationOutput>> {
        match self.dispatch(frame) {
            Dispatch::Navigation(job) => job.run().map(Some),
            _ => Ok(None),
        }
    }

    pub fn time(&self) -> Option<&TimeContext> {
        self.time.as_ref()
    }

    pub fn is_attack(&self) -> bool {
        self.detector.is_attack()
    }

    pub fn nation(&self) -> &str {
        &self.nation
    }

    fn apply_time(&mut self, frame: &RawFrame) -> Dispatch {
        let first = self.time.map(|t| t.first_galileo_timestamp_s);
        let Some(time) = TimeContext::from_frame(frame, self.latency.as_ref(), first) else {
            return Dispatch::Skipped(SkipReason::Truncated);
        };

        if first.is_none() {
            debug!(
                "First Galileo time: week {} tow {} ({})",
                time.gal_wno, time.gal_tow, time.galileo_timestamp_s
            );
        }
        trace!("Time context updated: galileo_ts={}", time.galileo_timestamp_s);
        self.time = Some(time);
        Dispatch::Time(time)
    }

    fn apply_clock(&mut self, frame: &RawFrame) -> Dispatch {
        if self.time.is_none() {
            trace!("Clock frame before first time message");
            return Dispatch::Skipped(SkipReason::AwaitingTime);
        }
        let data = frame.as_bytes();
        if data.len() < clock::MIN_LEN {
            return Dispatch::Skipped(SkipReason::Truncated);
        }
        let read_i32 = |at: usize| i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let sample = ClockSample::new(read_i32(clock::BIAS), read_i32(clock::DRIFT));
        let attack = self.detector.observe(sample);
        Dispatch::Clock { sample, attack }
    }

    fn prepare_navigation(&self, frame: RawFrame) -> Dispatch {
        let Some(time) = self.time else {
            trace!("Navigation frame before first time message");
            return Dispatch::Skipped(SkipReason::AwaitingTime);
        };
        if frame.len() < sfrbx::MIN_LEN {
            return Dispatch::Skipped(SkipReason::Truncated);
        }

        Dispatch::Navigation(NavigationJob {
            frame,
            time,
            attack: self.detector.is_attack(),
            nation: Arc::clone(&self.nation),
            validate: self.validate,
        })
    }
}

/// Navigation frame paired with the decode state it was received under.
#[derive(Debug, Clone)]
pub struct NavigationJob {
    frame: RawFrame,
    time: TimeContext,
    attack: bool,
    nation: Arc<str>,
    validate: bool,
}

/// Decoded navigation frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutput {
    pub table: String,
    pub record: NavigationRecord,
    /// Encoded chunk for offline validation, keyed by `record.galileo_ts`.
    pub sample: Option<ValidatedSample>,
}

impl NavigationJob {
    pub fn sv_id(&self) -> u8 {
        self.frame.as_bytes()[sfrbx::SV_ID]
    }

    pub fn time(&self) -> &TimeContext {
        &self.time
    }

    pub fn is_attack(&self) -> bool {
        self.attack
    }

    /// Extract the record fields and, when enabled, the validation sample.
    pub fn run(self) -> Result<NavigationOutput> {
        let data = self.frame.as_bytes();
        let auth: &[u8; sfrbx::AUTH_LEN] = data[sfrbx::AUTH..sfrbx::AUTH + sfrbx::AUTH_LEN]
            .try_into()
            .map_err(|_| ReaderError::malformed_frame("navigation frame too short for auth bits"))?;
        let words: &[u8; sfrbx::WORDS_LEN] = data[sfrbx::WORDS..sfrbx::WORDS + sfrbx::WORDS_LEN]
            .try_into()
            .map_err(|_| ReaderError::malformed_frame("navigation frame too short for words"))?;

        let sv_id = data[sfrbx::SV_ID];
        let reordered = reorder_words(words);
        let [ck_a, ck_b] = self.frame.trailer();

        let record = NavigationRecord {
            reception_time: self.time.reception_time_ms,
            unix_ts: self.time.unix_timestamp_ms,
            gal_tow: self.time.gal_tow,
            gal_wno: self.time.gal_wno,
            leap_s: self.time.leap_s,
            raw_hex: self.frame.to_hex(),
            galileo_data: hex::encode(reordered),
            auth_bits: extract_auth_bits(auth),
            sv_id,
            num_words: data[sfrbx::NUM_WORDS],
            ck_b,
            ck_a,
            time_ck_a: self.time.checksum_a,
            time_ck_b: self.time.checksum_b,
            authenticity: if self.attack { AUTHENTICITY_ATTACK } else { AUTHENTICITY_UNRESOLVED },
            galileo_ts: self.time.galileo_timestamp_s,
        };

        let sample = (self.validate && !self.attack).then(|| {
            let mut chunk = [0u8; INPUT_BYTES];
            chunk.copy_from_slice(&reordered[..INPUT_BYTES]);
            ValidatedSample {
                satellite_id: sv_id,
                encoded_hex: ConvolutionalCodec::encode_hex(&chunk),
            }
        });

        let table = table_name(self.frame.received_at().year(), &self.nation, sv_id);
        Ok(NavigationOutput { table, record, sample })
    }
}
