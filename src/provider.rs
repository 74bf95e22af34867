//! Provider trait for frame sources

use crate::Result;
use crate::types::RawFrame;

/// Trait for receiver frame sources
///
/// Providers abstract over where frames come from (a serial port, a capture
/// file) and handle their own timing internally. The driver owns a provider in
/// its reader task and hands it back once reading stops, so the source is
/// released only after in-flight work has drained.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Source ended on a frame boundary
    /// - `Err(e)` - Transport failure, the source cannot continue
    async fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Release the underlying source.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Name used in logs and errors (port path, capture file).
    fn source_name(&self) -> &str;
}
