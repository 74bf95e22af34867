//! UBX frame reader
//!
//! Turns a raw byte source into [`RawFrame`]s. The u-blox M8 emits corrupted
//! bytes right after the link is configured, so the reader starts by scanning
//! for preambles instead of trusting frame lengths:
//!
//! - **Cleaning**: read up to the next preamble and treat everything before it as
//!   one candidate frame; candidates shorter than 24 bytes are dropped. After 5
//!   accepted candidates the reader is aligned.
//! - **Transition**: the preamble of the next frame was consumed as the terminator
//!   of the last candidate, so exactly one frame is read starting at its header.
//! - **Steady**: skip the preamble, read the header, read payload and checksum.
//!
//! ## Usage Example
//!
//! ```rust
//! use ublox_reader::ubx::FrameReader;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> ublox_reader::Result<()> {
//! let capture: &[u8] = &[0xB5, 0x62, 0x01, 0x22, 0x02, 0x00, 0xAA, 0xBB, 0x11, 0x22];
//! let mut reader = FrameReader::synchronized(capture, "capture");
//! while let Some(frame) = reader.next_frame().await? {
//!     println!("class {:#04x} id {:#04x}", frame.class_id(), frame.type_id());
//! }
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info, trace};

use super::format::{CLEANING_FRAMES, HEADER_LEN, MIN_CLEANING_FRAME_LEN, PREAMBLE, TRAILER_LEN};
use crate::types::RawFrame;
use crate::{ReaderError, Result};

/// Alignment state of a [`FrameReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Scanning for preambles; `accepted` candidates returned so far.
    Cleaning { accepted: u8 },
    /// Next frame starts at its header.
    Transition,
    /// Aligned on preambles.
    Steady,
}

/// Pull-based frame reader over any async byte source.
pub struct FrameReader<R> {
    source: BufReader<R>,
    state: ReaderState,
    name: String,
    frames_read: u64,
    candidates_dropped: u64,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Reader for a freshly configured receiver; starts in Cleaning.
    pub fn new(source: R, name: impl Into<String>) -> Self {
        Self::with_state(source, name, ReaderState::Cleaning { accepted: 0 })
    }

    /// Reader for a stream already aligned on a preamble, such as a capture file.
    pub fn synchronized(source: R, name: impl Into<String>) -> Self {
        Self::with_state(source, name, ReaderState::Steady)
    }

    pub fn with_state(source: R, name: impl Into<String>, state: ReaderState) -> Self {
        Self {
            source: BufReader::new(source),
            state,
            name: name.into(),
            frames_read: 0,
            candidates_dropped: 0,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn candidates_dropped(&self) -> u64 {
        self.candidates_dropped
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the source ends on a frame boundary. Any I/O
    /// failure, including end of input inside a frame, is a transport error.
    pub async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let frame = match self.state {
            ReaderState::Cleaning { accepted } => self.read_cleaning(accepted).await?,
            ReaderState::Transition => self.read_transition().await?,
            ReaderState::Steady => self.read_steady().await?,
        };

        if let Some(frame) = &frame {
            self.frames_read += 1;
            trace!(
                "Frame {}: class={:#04x} id={:#04x} len={}",
                self.frames_read,
                frame.class_id(),
                frame.type_id(),
                frame.len()
            );
        }
        Ok(frame)
    }

    /// Consume the reader into a stream that ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<RawFrame>> {
        futures::stream::unfold(Some(self), |reader| async move {
            let mut reader = reader?;
            match reader.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Release the underlying source.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    async fn read_cleaning(&mut self, accepted: u8) -> Result<Option<RawFrame>> {
        loop {
            let Some(candidate) = self.scan_to_preamble().await? else {
                return Ok(None);
            };

            if candidate.len() < MIN_CLEANING_FRAME_LEN {
                self.candidates_dropped += 1;
                trace!("Dropped {} byte candidate while cleaning", candidate.len());
                continue;
            }

            let accepted = accepted + 1;
            if accepted >= CLEANING_FRAMES {
                info!(
                    "Receiver buffer cleaned ({} candidates dropped), switching to framed reads",
                    self.candidates_dropped
                );
                self.state = ReaderState::Transition;
            } else {
                self.state = ReaderState::Cleaning { accepted };
            }
            return RawFrame::new(candidate).map(Some);
        }
    }

    async fn read_transition(&mut self) -> Result<Option<RawFrame>> {
        if self.at_end().await? {
            return Ok(None);
        }
        let frame = self.read_framed().await?;
        debug!("Transition frame read, reader aligned on preambles");
        self.state = ReaderState::Steady;
        Ok(Some(frame))
    }

    async fn read_steady(&mut self) -> Result<Option<RawFrame>> {
        if self.at_end().await? {
            return Ok(None);
        }
        let mut preamble = [0u8; PREAMBLE.len()];
        self.read_exact(&mut preamble).await?;
        if preamble != PREAMBLE {
            debug!("Unexpected preamble {:02x?}, reading frame anyway", preamble);
        }
        self.read_framed().await.map(Some)
    }

    /// Read header, payload and checksum of a frame whose preamble is already consumed.
    async fn read_framed(&mut self) -> Result<RawFrame> {
        let mut header = [0u8; HEADER_LEN];
        self.read_exact(&mut header).await?;
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;

        let mut data = Vec::with_capacity(HEADER_LEN + len + TRAILER_LEN);
        data.extend_from_slice(&header);
        data.resize(HEADER_LEN + len + TRAILER_LEN, 0);
        self.read_exact(&mut data[HEADER_LEN..]).await?;

        RawFrame::new(data)
    }

    /// Bytes up to the next preamble, preamble removed. `None` at end of input.
    async fn scan_to_preamble(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        loop {
            let n = self
                .source
                .read_until(PREAMBLE[1], &mut buf)
                .await
                .map_err(|e| ReaderError::serial(self.name.clone(), e))?;

            if n == 0 {
                if !buf.is_empty() {
                    debug!("Input ended with {} unterminated bytes", buf.len());
                }
                return Ok(None);
            }

            if buf.ends_with(&PREAMBLE) {
                buf.truncate(buf.len() - PREAMBLE.len());
                return Ok(Some(buf));
            }
        }
    }

    async fn at_end(&mut self) -> Result<bool> {
        let available = self
            .source
            .fill_buf()
            .await
            .map_err(|e| ReaderError::serial(self.name.clone(), e))?;
        Ok(available.is_empty())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.source
            .read_exact(buf)
            .await
            .map(|_| ())
            .map_err(|e| ReaderError::serial(self.name.clone(), e))
    }
}
