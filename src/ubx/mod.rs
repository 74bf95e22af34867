//! UBX protocol framing
//!
//! [`format`] holds the wire constants and field offsets, [`reader`] turns a
//! byte source into frames.

pub mod format;
pub mod reader;

pub use format::setup_frames;
pub use reader::{FrameReader, ReaderState};
