//! Replay provider for captured receiver byte streams

use std::io::Cursor;
use std::path::Path;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::provider::Provider;
use crate::types::RawFrame;
use crate::ubx::{FrameReader, ReaderState};
use crate::{ReaderError, Result};

/// Replay provider that reads frames from a capture held in memory
///
/// Captures written by the serial provider start on a preamble, so the reader
/// starts aligned. Raw dumps taken straight from a freshly configured receiver
/// can be replayed through the cleaning phase with [`ReplayProvider::unaligned`].
pub struct ReplayProvider {
    reader: FrameReader<Cursor<Vec<u8>>>,
    name: String,
    total_bytes: usize,
    pacing: Option<Duration>,
    interval: Option<Interval>,
}

impl ReplayProvider {
    /// Load a capture file.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            tokio::fs::read(path).await.map_err(|e| ReaderError::file_error(path, e))?;
        info!("Opened capture {}: {} bytes", path.display(), bytes.len());
        Ok(Self::from_bytes(path.display().to_string(), bytes))
    }

    /// Replay bytes already in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let total_bytes = bytes.len();
        Self {
            reader: FrameReader::synchronized(Cursor::new(bytes), name.clone()),
            name,
            total_bytes,
            pacing: None,
            interval: None,
        }
    }

    /// Start in the cleaning phase instead of assuming alignment.
    pub fn unaligned(mut self) -> Self {
        let source = self.reader.into_inner();
        self.reader =
            FrameReader::with_state(source, self.name.clone(), ReaderState::Cleaning { accepted: 0 });
        self
    }

    /// Emit at most one frame per `period`. A zero period disables pacing.
    pub fn with_pacing(mut self, period: Duration) -> Self {
        self.pacing = (!period.is_zero()).then_some(period);
        self.interval = None;
        debug!("Replay pacing set to {:?}", self.pacing);
        self
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn frames_read(&self) -> u64 {
        self.reader.frames_read()
    }
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if let Some(period) = self.pacing {
            let ticker = self.interval.get_or_insert_with(|| {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ticker.tick().await;
        }

        let frame = self.reader.next_frame().await?;
        if frame.is_none() {
            debug!("Reached end of replay after {} frames", self.reader.frames_read());
        }
        Ok(frame)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{NAV_FRAME, TIME_FRAME, capture, cleaning_stream};
    use std::time::Instant;

    #[tokio::test]
    async fn replays_every_captured_frame() {
        let mut provider =
            ReplayProvider::from_bytes("memory", capture(&[TIME_FRAME, NAV_FRAME, TIME_FRAME]));

        let mut frames = Vec::new();
        while let Some(frame) = provider.next_frame().await.unwrap() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].as_bytes(), NAV_FRAME);
        assert_eq!(provider.frames_read(), 3);
        assert_eq!(provider.source_name(), "memory");
    }

    #[tokio::test]
    async fn unaligned_replay_goes_through_cleaning() {
        let bytes = cleaning_stream(&[TIME_FRAME, NAV_FRAME]);
        let mut provider = ReplayProvider::from_bytes("dump", bytes).unaligned();

        let mut count = 0;
        let mut last = None;
        while let Some(frame) = provider.next_frame().await.unwrap() {
            count += 1;
            last = Some(frame);
        }
        // Five cleaning candidates, the transition frame and one steady frame.
        assert_eq!(count, 7);
        assert_eq!(last.unwrap().as_bytes(), NAV_FRAME);
    }

    #[tokio::test]
    async fn pacing_spaces_frames_out() {
        let mut provider = ReplayProvider::from_bytes("memory", capture(&[TIME_FRAME; 3]))
            .with_pacing(Duration::from_millis(20));

        let started = Instant::now();
        while provider.next_frame().await.unwrap().is_some() {}
        // First tick completes immediately, the remaining three wait one period each.
        assert!(started.elapsed() >= Duration::from_millis(55));
    }

    #[tokio::test]
    async fn reads_capture_file() {
        let path = std::env::temp_dir().join(format!("ublox-replay-{}.ubx", std::process::id()));
        tokio::fs::write(&path, capture(&[TIME_FRAME, NAV_FRAME])).await.unwrap();

        let mut provider = ReplayProvider::open(&path).await.unwrap();
        assert_eq!(provider.total_bytes(), TIME_FRAME.len() + NAV_FRAME.len() + 4);
        assert!(provider.next_frame().await.unwrap().is_some());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_capture_is_a_file_error() {
        let result = ReplayProvider::open("/nonexistent/capture.ubx").await;
        assert!(matches!(result, Err(ReaderError::File { .. })));
    }
}
