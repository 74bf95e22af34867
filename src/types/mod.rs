//! Core types for receiver data representation.
//!
//! This module provides the data structures that flow between the frame reader,
//! the decoder and the storage collaborators.
//!
//! ## Architecture
//!
//! - [`RawFrame`] is one UBX frame without its preamble, shared cheaply via `Arc`
//! - [`TimeContext`] holds the latest Galileo time solution
//! - [`ClockSample`] is one receiver clock bias/drift observation
//! - [`NavigationRecord`] is the 16-field record handed to storage
//! - [`ValidatedSample`] is an encoded subframe chunk for offline cross-checks
//! - [`bitfield`] holds the bit-level extraction helpers
//!
//! ## Usage Example
//!
//! ```rust
//! use ublox_reader::types::{MessageKind, ParityLatency, RawFrame, TimeContext};
//!
//! let bytes = vec![
//!     0x01, 0x25, 0x14, 0x00, 0x00, 0x16, 0x9C, 0x16, 0xC0, 0xC9, 0x05, 0x00, 0x1C,
//!     0xA4, 0x02, 0x00, 0x31, 0x04, 0x12, 0x07, 0x03, 0x00, 0x00, 0x00, 0xA3, 0xEF,
//! ];
//! let frame = RawFrame::new(bytes).unwrap();
//! assert_eq!(frame.kind(), MessageKind::Time);
//!
//! let time = TimeContext::from_frame(&frame, &ParityLatency, None).unwrap();
//! assert_eq!(time.galileo_timestamp_s, 649_329_725);
//! ```

pub mod bitfield;
mod frame;
mod record;
mod time;

pub use bitfield::{extract_auth_bits, extract_word_reordered, reorder_words};
pub use frame::{MessageKind, RawFrame};
pub use record::{
    AUTHENTICITY_ATTACK, AUTHENTICITY_UNRESOLVED, COLUMNS, ClockSample, NavigationRecord,
    PRIMARY_KEY, ValidatedSample, table_name,
};
pub use time::{
    GALILEO_EPOCH_UNIX_MS, LatencyCorrection, ParityLatency, SECONDS_PER_WEEK, TimeContext,
};
