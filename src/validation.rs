//! Validation sample buffering
//!
//! Encoded subframe chunks are grouped by the Galileo timestamp of the record
//! they came from. Once 60 distinct timestamps are buffered, the oldest 50 are
//! written out; the rest stay until more arrive or the pipeline shuts down.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::types::ValidatedSample;
use crate::{ReaderError, Result};

/// Buffered buckets that trigger a flush.
pub const FLUSH_TRIGGER: usize = 60;

/// Oldest buckets written per flush.
pub const FLUSH_BATCH: usize = 50;

/// Samples sharing one Galileo timestamp.
pub type Bucket = (i64, Vec<ValidatedSample>);

/// Time-bucketed samples waiting to be written.
#[derive(Debug, Default)]
pub struct ValidationBuffer {
    buckets: BTreeMap<i64, Vec<ValidatedSample>>,
}

impl ValidationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample. Returns the oldest buckets when the flush threshold is reached.
    pub fn push(&mut self, galileo_ts: i64, sample: ValidatedSample) -> Option<Vec<Bucket>> {
        self.buckets.entry(galileo_ts).or_default().push(sample);
        (self.buckets.len() >= FLUSH_TRIGGER).then(|| self.take_oldest(FLUSH_BATCH))
    }

    /// Remove and return every buffered bucket, oldest first.
    pub fn drain(&mut self) -> Vec<Bucket> {
        std::mem::take(&mut self.buckets).into_iter().collect()
    }

    /// Put back buckets whose write failed, ahead of samples buffered since.
    pub fn restore(&mut self, batch: Vec<Bucket>) {
        for (galileo_ts, samples) in batch {
            let bucket = self.buckets.entry(galileo_ts).or_default();
            let newer = std::mem::replace(bucket, samples);
            bucket.extend(newer);
        }
    }

    /// Number of distinct buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn take_oldest(&mut self, count: usize) -> Vec<Bucket> {
        let keep = match self.buckets.keys().nth(count) {
            Some(&boundary) => self.buckets.split_off(&boundary),
            None => BTreeMap::new(),
        };
        std::mem::replace(&mut self.buckets, keep).into_iter().collect()
    }
}

/// Append-only destination for flushed buckets.
#[async_trait::async_trait]
pub trait ValidationSink: Send + 'static {
    async fn write_batch(&mut self, batch: &[Bucket]) -> Result<()>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one `galileo_ts,satellite_id,encoded_hex` line per sample.
#[derive(Debug)]
pub struct ValidationFile {
    path: PathBuf,
    file: Option<File>,
}

impl ValidationFile {
    /// The file is opened for append on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn file(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| ReaderError::file_error(&self.path, e))?;
            info!("Writing validation samples to {}", self.path.display());
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| ReaderError::file_error(&self.path, std::io::Error::other("not open")))
    }
}

#[async_trait::async_trait]
impl ValidationSink for ValidationFile {
    async fn write_batch(&mut self, batch: &[Bucket]) -> Result<()> {
        let mut text = String::new();
        for (galileo_ts, samples) in batch {
            for sample in samples {
                text.push_str(&format!(
                    "{},{},{}\n",
                    galileo_ts, sample.satellite_id, sample.encoded_hex
                ));
            }
        }
        let path = self.path.clone();
        let file = self.file().await?;
        file.write_all(text.as_bytes()).await.map_err(|e| ReaderError::file_error(&path, e))?;
        file.flush().await.map_err(|e| ReaderError::file_error(&path, e))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.sync_all().await.map_err(|e| ReaderError::file_error(&self.path, e))?;
        }
        self.file = None;
        Ok(())
    }
}

/// Buffer plus sink, driven by the pipeline.
pub struct Validator {
    buffer: ValidationBuffer,
    sink: Box<dyn ValidationSink>,
    written: u64,
}

impl Validator {
    pub fn new(sink: Box<dyn ValidationSink>) -> Self {
        Self { buffer: ValidationBuffer::new(), sink, written: 0 }
    }

    /// Buffer a sample, writing the oldest buckets when the threshold is reached.
    pub async fn record(&mut self, galileo_ts: i64, sample: ValidatedSample) -> Result<()> {
        if let Some(batch) = self.buffer.push(galileo_ts, sample) {
            self.write(batch).await?;
        }
        Ok(())
    }

    /// Write every remaining bucket and close the sink.
    pub async fn finish(&mut self) -> Result<u64> {
        let rest = self.buffer.drain();
        if !rest.is_empty() {
            self.write(rest).await?;
        }
        self.sink.close().await?;
        Ok(self.written)
    }

    /// Samples written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    async fn write(&mut self, batch: Vec<Bucket>) -> Result<()> {
        let samples: usize = batch.iter().map(|(_, s)| s.len()).sum();
        if let Err(e) = self.sink.write_batch(&batch).await {
            warn!("Keeping {} validation buckets after failed write: {}", batch.len(), e);
            self.buffer.restore(batch);
            return Err(e);
        }
        self.written += samples as u64;
        debug!("Flushed {} validation buckets ({} samples)", batch.len(), samples);
        Ok(())
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("buffered", &self.buffer.len())
            .field("written", &self.written)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Sink collecting batches in memory.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct CollectingSink {
        pub batches: Arc<Mutex<Vec<Vec<Bucket>>>>,
    }

    #[async_trait::async_trait]
    impl ValidationSink for CollectingSink {
        async fn write_batch(&mut self, batch: &[Bucket]) -> Result<()> {
            self.batches.lock().await.push(batch.to_vec());
            Ok(())
        }
    }

    /// Sink rejecting its first `failures` writes.
    struct FlakySink {
        failures: usize,
        inner: CollectingSink,
    }

    #[async_trait::async_trait]
    impl ValidationSink for FlakySink {
        async fn write_batch(&mut self, batch: &[Bucket]) -> Result<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(ReaderError::file_error("validation.txt", std::io::Error::other("disk full")));
            }
            self.inner.write_batch(batch).await
        }
    }

    fn sample(sv: u8) -> ValidatedSample {
        ValidatedSample { satellite_id: sv, encoded_hex: format!("{:02x}", sv) }
    }

    #[test]
    fn flushes_oldest_fifty_at_sixty_buckets() {
        let mut buffer = ValidationBuffer::new();
        for ts in (0..59).rev() {
            assert!(buffer.push(ts, sample(1)).is_none());
        }
        assert!(buffer.push(1000, sample(2)).is_some_and(|batch| {
            batch.len() == FLUSH_BATCH
                && batch.first().map(|b| b.0) == Some(0)
                && batch.last().map(|b| b.0) == Some(49)
        }));
        assert_eq!(buffer.len(), FLUSH_TRIGGER - FLUSH_BATCH);
    }

    #[test]
    fn samples_with_same_timestamp_share_a_bucket() {
        let mut buffer = ValidationBuffer::new();
        buffer.push(7, sample(1));
        buffer.push(7, sample(2));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.drain(), vec![(7, vec![sample(1), sample(2)])]);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn validator_flushes_rest_on_finish() {
        let sink = CollectingSink::default();
        let mut validator = Validator::new(Box::new(sink.clone()));

        for ts in 0..65 {
            validator.record(ts, sample(3)).await.unwrap();
        }
        assert_eq!(validator.written(), FLUSH_BATCH as u64);

        assert_eq!(validator.finish().await.unwrap(), 65);
        let batches = sink.batches.lock().await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 15);
    }

    #[test]
    fn restored_buckets_precede_newer_samples() {
        let mut buffer = ValidationBuffer::new();
        buffer.push(5, sample(9));
        buffer.restore(vec![(5, vec![sample(1)]), (4, vec![sample(2)])]);
        assert_eq!(buffer.drain(), vec![(4, vec![sample(2)]), (5, vec![sample(1), sample(9)])]);
    }

    #[tokio::test]
    async fn failed_flush_is_retried_on_finish() {
        let inner = CollectingSink::default();
        let mut validator =
            Validator::new(Box::new(FlakySink { failures: 1, inner: inner.clone() }));

        for ts in 0..(FLUSH_TRIGGER as i64 - 1) {
            validator.record(ts, sample(4)).await.unwrap();
        }
        assert!(validator.record(100, sample(4)).await.is_err());
        assert_eq!(validator.written(), 0);

        assert_eq!(validator.finish().await.unwrap(), FLUSH_TRIGGER as u64);
        let batches = inner.batches.lock().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), FLUSH_TRIGGER);
        assert_eq!(batches[0][0].0, 0);
    }

    #[tokio::test]
    async fn file_sink_writes_one_line_per_sample() {
        let path = std::env::temp_dir().join(format!("ublox-validation-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut sink = ValidationFile::new(&path);
        sink.write_batch(&[(100, vec![sample(18), sample(7)]), (101, vec![sample(18)])])
            .await
            .unwrap();
        sink.close().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "100,18,12\n100,7,07\n101,18,12\n");
        std::fs::remove_file(&path).unwrap();
    }
}
