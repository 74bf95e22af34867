//! Frame processing pipeline
//!
//! ```text
//! Provider ──▶ reader task ──▶ bounded queue ──▶ dispatcher ──▶ worker pool ──▶ Store
//!                                                  │                   └──────▶ Validator
//!                                                  └─ time / clock state
//! ```
//!
//! The dispatcher applies time and clock messages to the [`MessageDecoder`]
//! itself, in arrival order, before any later navigation frame is dispatched.
//! Navigation frames leave the dispatcher as [`NavigationJob`]s carrying their own
//! copy of the time context, so workers never see a later update.
//!
//! Shutdown: the reader stops at cancellation or end of input, the queue is
//! drained, in-flight workers finish, remaining validation buckets are written,
//! then the provider and the store are closed.

use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::decoder::{Dispatch, MessageDecoder, NavigationJob};
use crate::driver::{Driver, DriverChannels};
use crate::provider::Provider;
use crate::storage::Store;
use crate::validation::{ValidationFile, ValidationSink, Validator};
use crate::{ReaderError, Result};

/// Counters reported when the pipeline stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub time_messages: u64,
    pub clock_messages: u64,
    pub navigation_messages: u64,
    pub skipped: u64,
    /// Clock samples flagged by the meaconing detector.
    pub attacks_flagged: u64,
    pub records_stored: u64,
    pub store_failures: u64,
    pub decode_failures: u64,
    pub validation_samples: u64,
}

#[derive(Debug, Default)]
struct WorkerOutcome {
    stored: bool,
    store_failed: bool,
    decode_failed: bool,
}

impl PipelineStats {
    fn absorb(&mut self, outcome: WorkerOutcome) {
        self.records_stored += u64::from(outcome.stored);
        self.store_failures += u64::from(outcome.store_failed);
        self.decode_failures += u64::from(outcome.decode_failed);
    }
}

pub struct Pipeline {
    decoder: MessageDecoder,
    store: Arc<dyn Store>,
    validator: Option<Arc<Mutex<Validator>>>,
    queue_capacity: usize,
    workers: usize,
}

impl Pipeline {
    pub fn new(decoder: MessageDecoder, store: Arc<dyn Store>) -> Self {
        Self { decoder, store, validator: None, queue_capacity: 256, workers: 4 }
    }

    /// Pipeline with decoder, worker pool and validation output taken from `config`.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Self {
        let decoder =
            MessageDecoder::new(config.decoder.nation.as_str(), config.decoder.meaconing_threshold);
        let pipeline = Self::new(decoder, store)
            .with_queue_capacity(config.pipeline.queue_capacity)
            .with_workers(config.pipeline.workers);

        if config.validation.enabled {
            pipeline.with_validation(Box::new(ValidationFile::new(&config.validation.path)))
        } else {
            pipeline
        }
    }

    /// Produce validation samples and write them to `sink`.
    pub fn with_validation(mut self, sink: Box<dyn ValidationSink>) -> Self {
        self.decoder = self.decoder.with_validation(true);
        self.validator = Some(Arc::new(Mutex::new(Validator::new(sink))));
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Read `provider` until it ends, fails or `cancel` fires.
    ///
    /// A provider failure cancels `cancel` and is returned after the shutdown
    /// sequence has completed.
    pub async fn run<P>(mut self, provider: P, cancel: CancellationToken) -> Result<PipelineStats>
    where
        P: Provider,
    {
        info!(
            source = provider.source_name(),
            workers = self.workers,
            queue_capacity = self.queue_capacity,
            validation = self.validator.is_some(),
            "Pipeline starting"
        );

        let DriverChannels { mut frames, reader } =
            Driver::spawn(provider, self.queue_capacity, cancel.clone());
        let pool = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut stats = PipelineStats::default();

        while let Some(frame) = frames.recv().await {
            stats.frames += 1;
            match self.decoder.dispatch(frame) {
                Dispatch::Time(_) => stats.time_messages += 1,
                Dispatch::Clock { attack, .. } => {
                    stats.clock_messages += 1;
                    stats.attacks_flagged += u64::from(attack);
                }
                Dispatch::Navigation(job) => {
                    stats.navigation_messages += 1;
                    let permit = Arc::clone(&pool)
                        .acquire_owned()
                        .await
                        .map_err(|_| ReaderError::task_failed("worker pool closed"))?;
                    let store = Arc::clone(&self.store);
                    let validator = self.validator.clone();
                    tasks.spawn(async move {
                        let outcome = process(job, store, validator).await;
                        drop(permit);
                        outcome
                    });
                }
                Dispatch::Skipped(reason) => {
                    stats.skipped += 1;
                    trace!("Skipped frame: {:?}", reason);
                }
            }

            while let Some(done) = tasks.try_join_next() {
                absorb_joined(&mut stats, done);
            }
        }

        debug!("Frame queue drained, waiting for {} workers", tasks.len());
        while let Some(done) = tasks.join_next().await {
            absorb_joined(&mut stats, done);
        }

        let exit = reader
            .await
            .map_err(|e| ReaderError::task_failed(format!("frame reader task: {}", e)))?;

        if let Some(validator) = &self.validator {
            match validator.lock().await.finish().await {
                Ok(written) => stats.validation_samples = written,
                Err(e) => warn!("Failed to flush validation samples: {}", e),
            }
        }

        let mut provider = exit.provider;
        if let Err(e) = provider.close().await {
            warn!("Failed to close {}: {}", provider.source_name(), e);
        }
        if let Err(e) = self.store.close().await {
            warn!("Failed to close store: {}", e);
        }

        info!(
            frames = stats.frames,
            navigation = stats.navigation_messages,
            stored = stats.records_stored,
            "Pipeline stopped"
        );
        exit.result.map(|()| stats)
    }
}

fn absorb_joined(stats: &mut PipelineStats, joined: std::result::Result<WorkerOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => stats.absorb(outcome),
        Err(e) => {
            error!("Navigation worker failed: {}", e);
            stats.decode_failures += 1;
        }
    }
}

async fn process(
    job: NavigationJob,
    store: Arc<dyn Store>,
    validator: Option<Arc<Mutex<Validator>>>,
) -> WorkerOutcome {
    let sv_id = job.sv_id();
    let output = match tokio::task::spawn_blocking(move || job.run()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!("Failed to decode navigation frame from E{:02}: {}", sv_id, e);
            return WorkerOutcome { decode_failed: true, ..Default::default() };
        }
        Err(e) => {
            error!("Decode task for E{:02} failed: {}", sv_id, e);
            return WorkerOutcome { decode_failed: true, ..Default::default() };
        }
    };

    let mut outcome = WorkerOutcome::default();
    match store.store(&output.table, &output.record).await {
        Ok(()) => {
            trace!("Stored {} in {}", output.record.unix_ts, output.table);
            outcome.stored = true;
        }
        Err(e) => {
            warn!("Failed to store record in {}: {}", output.table, e);
            outcome.store_failed = true;
        }
    }

    if let (Some(sample), Some(validator)) = (output.sample, validator) {
        if let Err(e) = validator.lock().await.record(output.record.galileo_ts, sample).await {
            warn!("Failed to write validation samples: {}", e);
        }
    }
    outcome
}
