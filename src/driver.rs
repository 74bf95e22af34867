//! Driver spawns and manages the frame reader task

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::provider::Provider;
use crate::Result;
use crate::types::RawFrame;

/// Result of spawning the reader task
pub struct DriverChannels<P> {
    /// Frames in arrival order; closes when the reader stops
    pub frames: mpsc::Receiver<RawFrame>,
    /// Reader task, yields the provider back once it stops reading
    pub reader: JoinHandle<ReaderExit<P>>,
}

/// What the reader task hands back when it stops
pub struct ReaderExit<P> {
    /// Provider, still open; the caller releases it after draining
    pub provider: P,
    pub frames_read: u64,
    /// `Err` when the provider failed, which also cancels the token
    pub result: Result<()>,
}

/// Driver spawns the reader task that owns the provider
///
/// The reader is the only producer of the bounded frame queue, so a slow
/// consumer applies backpressure all the way to the byte source.
pub struct Driver;

impl Driver {
    /// Spawn the reader task for the given provider
    ///
    /// Cancelling `cancel` stops the reader before its next read. Frames already
    /// queued stay available to the consumer.
    pub fn spawn<P>(provider: P, capacity: usize, cancel: CancellationToken) -> DriverChannels<P>
    where
        P: Provider,
    {
        let (frame_tx, frame_rx) = mpsc::channel(capacity.max(1));

        let reader = tokio::spawn(async move { Self::frame_reader_task(provider, frame_tx, cancel).await });

        DriverChannels { frames: frame_rx, reader }
    }

    async fn frame_reader_task<P>(
        mut provider: P,
        frame_tx: mpsc::Sender<RawFrame>,
        cancel: CancellationToken,
    ) -> ReaderExit<P>
    where
        P: Provider,
    {
        info!("Frame reader task started on {}", provider.source_name());
        let mut frames_read = 0u64;

        let result = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Frame reader cancelled");
                    break Ok(());
                }
                next = provider.next_frame() => next,
            };

            match next {
                Ok(Some(frame)) => {
                    frames_read += 1;
                    trace!("Queued frame {} ({} bytes)", frames_read, frame.len());

                    if frame_tx.send(frame).await.is_err() {
                        debug!("Frame receiver dropped, shutting down");
                        break Ok(());
                    }
                }
                Ok(None) => {
                    info!("Provider stream ended after {} frames", frames_read);
                    break Ok(());
                }
                Err(e) => {
                    error!("Provider {} failed: {}", provider.source_name(), e);
                    cancel.cancel();
                    break Err(e);
                }
            }
        };

        drop(frame_tx);
        info!("Frame reader task ended (read {} frames)", frames_read);
        ReaderExit { provider, frames_read, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReaderError;
    use crate::providers::ReplayProvider;
    use crate::test_utils::{NAV_FRAME, TIME_FRAME, capture};
    use std::collections::VecDeque;

    struct Scripted {
        steps: VecDeque<Result<Option<RawFrame>>>,
    }

    #[async_trait::async_trait]
    impl Provider for Scripted {
        async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
            match self.steps.pop_front() {
                Some(step) => step,
                None => std::future::pending().await,
            }
        }

        fn source_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn forwards_frames_in_order_until_end() {
        let provider = ReplayProvider::from_bytes("memory", capture(&[TIME_FRAME, NAV_FRAME]));
        let cancel = CancellationToken::new();
        let DriverChannels { mut frames, reader } = Driver::spawn(provider, 1, cancel.clone());

        assert_eq!(frames.recv().await.unwrap().as_bytes(), TIME_FRAME);
        assert_eq!(frames.recv().await.unwrap().as_bytes(), NAV_FRAME);
        assert!(frames.recv().await.is_none());

        let exit = reader.await.unwrap();
        assert!(exit.result.is_ok());
        assert_eq!(exit.frames_read, 2);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn provider_error_cancels_and_is_returned() {
        let steps = VecDeque::from(vec![
            Ok(Some(RawFrame::new(TIME_FRAME.to_vec()).unwrap())),
            Err(ReaderError::serial("scripted", std::io::Error::other("unplugged"))),
        ]);
        let cancel = CancellationToken::new();
        let DriverChannels { mut frames, reader } =
            Driver::spawn(Scripted { steps }, 4, cancel.clone());

        assert!(frames.recv().await.is_some());
        assert!(frames.recv().await.is_none());

        let exit = reader.await.unwrap();
        assert!(exit.result.unwrap_err().is_fatal());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_pending_read() {
        let cancel = CancellationToken::new();
        let DriverChannels { mut frames, reader } =
            Driver::spawn(Scripted { steps: VecDeque::new() }, 4, cancel.clone());

        cancel.cancel();
        assert!(frames.recv().await.is_none());
        let exit = reader.await.unwrap();
        assert!(exit.result.is_ok());
        assert_eq!(exit.provider.source_name(), "scripted");
    }
}
