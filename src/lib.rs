//! Galileo navigation data reader for u-blox GNSS receivers.
//!
//! Reads the UBX byte stream of a u-blox M8 over a serial port, decodes Galileo
//! time, receiver clock and raw subframe messages, flags meaconing from clock
//! discontinuities, and hands one record per subframe to a storage collaborator.
//!
//! # Features
//!
//! - **Framing**: startup cleaning, transition and steady states over any async byte source
//! - **Decoding**: Galileo time with latency correction, OSNMA auth bits, word-reordered data
//! - **Meaconing**: clock bias and drift continuity checks
//! - **Validation**: convolutional encoding of subframe chunks for offline cross-checks
//! - **Replay**: the same pipeline over captured byte streams
//!
//! ## Example (capture replay)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use ublox_reader::{MemoryStore, MessageDecoder, Pipeline, ReplayProvider};
//!
//! #[tokio::main]
//! async fn main() -> ublox_reader::Result<()> {
//!     let provider = ReplayProvider::open("session.ubx").await?;
//!     let store = Arc::new(MemoryStore::new());
//!     let stats = Pipeline::new(MessageDecoder::new("ITA", 50), store.clone())
//!         .run(provider, CancellationToken::new())
//!         .await?;
//!
//!     println!("{} records in {:?}", stats.records_stored, store.tables().await);
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Protocol and decoding
pub mod codec;
pub mod decoder;
pub mod meaconing;
pub mod ubx;

// Stream-based processing
pub mod driver;
pub mod pipeline;
pub mod provider;
pub mod providers;

// Collaborators
pub mod storage;
pub mod validation;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use codec::ConvolutionalCodec;
pub use config::Config;
pub use decoder::{Dispatch, MessageDecoder, NavigationJob, NavigationOutput, SkipReason};
pub use meaconing::MeaconingDetector;
pub use pipeline::{Pipeline, PipelineStats};
pub use provider::Provider;
pub use providers::{ReplayProvider, SerialProvider};
pub use storage::{JsonLinesStore, MemoryStore, Store};
pub use ubx::{FrameReader, ReaderState};
pub use validation::{ValidationBuffer, ValidationFile, ValidationSink};

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Unified entry point wiring a source, the JSON-lines store and the pipeline
/// from a [`Config`].
///
/// # Examples
///
/// ## Live receiver
/// ```rust,no_run
/// use tokio_util::sync::CancellationToken;
/// use ublox_reader::{Config, UbloxReader};
///
/// #[tokio::main]
/// async fn main() -> ublox_reader::Result<()> {
///     let config = Config::load("ublox-reader.yaml")?;
///     let stats = UbloxReader::run(&config, CancellationToken::new()).await?;
///     println!("stored {} records", stats.records_stored);
///     Ok(())
/// }
/// ```
pub struct UbloxReader;

impl UbloxReader {
    /// Read the configured serial port until cancelled or the port fails.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The port cannot be opened or configured
    /// - The port fails while reading (after the shutdown sequence completes)
    pub async fn run(config: &Config, cancel: CancellationToken) -> Result<PipelineStats> {
        let serial = config.serial.clone();
        let stop = cancel.clone();
        let provider = tokio::task::spawn_blocking(move || SerialProvider::open(&serial, &stop))
            .await
            .map_err(|e| ReaderError::task_failed(format!("opening serial port: {}", e)))??;

        Self::run_with(provider, config, cancel).await
    }

    /// Process a capture file with the same decoder, storage and validation settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture cannot be read or ends inside a frame.
    pub async fn replay<P: AsRef<Path>>(
        path: P,
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<PipelineStats> {
        let provider = ReplayProvider::open(path).await?;
        Self::run_with(provider, config, cancel).await
    }

    async fn run_with<P: Provider>(
        provider: P,
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<PipelineStats> {
        let store = Arc::new(JsonLinesStore::new(&config.storage.directory));
        Pipeline::from_config(config, store).run(provider, cancel).await
    }
}
