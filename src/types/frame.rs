//! Raw protocol frames as produced by the frame reader

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::ubx::format::{
    CLASS_NAV, CLASS_RXM, HEADER_LEN, ID_NAV_CLOCK, ID_NAV_TIMEGAL, TRAILER_LEN, gnss_id, sfrbx,
};
use crate::{ReaderError, Result};

/// One UBX frame with its preamble removed.
///
/// The bytes are kept exactly as read: class, id, little-endian length, payload
/// and the two checksum bytes. Offsets used by the decoder index into these bytes.
/// Frames are cheap to clone so they can cross into worker tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    data: Arc<[u8]>,
    received_at: DateTime<Utc>,
}

impl RawFrame {
    /// Wrap frame bytes read just now.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        Self::received(data, Utc::now())
    }

    /// Wrap frame bytes with an explicit reception instant.
    pub fn received(data: Vec<u8>, received_at: DateTime<Utc>) -> Result<Self> {
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(ReaderError::malformed_frame(format!(
                "{} bytes cannot hold a header and trailer",
                data.len()
            )));
        }
        Ok(Self { data: data.into(), received_at })
    }

    pub fn class_id(&self) -> u8 {
        self.data[0]
    }

    pub fn type_id(&self) -> u8 {
        self.data[1]
    }

    /// Length announced by the header. Frames scanned during startup may disagree
    /// with their actual size.
    pub fn declared_len(&self) -> u16 {
        u16::from_le_bytes([self.data[2], self.data[3]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_LEN..self.data.len() - TRAILER_LEN]
    }

    pub fn trailer(&self) -> [u8; 2] {
        let n = self.data.len();
        [self.data[n - 2], self.data[n - 1]]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }

    /// Classify by class/id, and by constellation code for subframes.
    pub fn kind(&self) -> MessageKind {
        match (self.class_id(), self.type_id()) {
            (CLASS_NAV, ID_NAV_TIMEGAL) => MessageKind::Time,
            (CLASS_NAV, ID_NAV_CLOCK) => MessageKind::Clock,
            (CLASS_RXM, _) => match self.data.get(sfrbx::GNSS_ID) {
                Some(&gnss_id::GALILEO) => MessageKind::Navigation,
                Some(&code) => MessageKind::OtherConstellation(code),
                None => MessageKind::Unknown { class_id: CLASS_RXM, type_id: self.type_id() },
            },
            (class_id, type_id) => MessageKind::Unknown { class_id, type_id },
        }
    }
}

/// Message families the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// NAV-TIMEGAL
    Time,
    /// NAV-CLOCK
    Clock,
    /// RXM-SFRBX carrying Galileo data
    Navigation,
    /// RXM-SFRBX from another constellation
    OtherConstellation(u8),
    Unknown { class_id: u8, type_id: u8 },
}
