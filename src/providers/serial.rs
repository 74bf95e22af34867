//! Serial port provider
//!
//! `serialport` only offers blocking reads, so a dedicated thread pumps bytes
//! into a bounded channel and the async side reads them back through a
//! [`StreamReader`]. The thread watches a child of the caller's stop token, so
//! it issues no further reads once the stop signal fires. It also stops when
//! the port fails or the channel is dropped. The port itself is released in
//! [`Provider::close`].

use bytes::Bytes;
use std::io::{self, Read, Write};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::config::SerialConfig;
use crate::provider::Provider;
use crate::types::RawFrame;
use crate::ubx::{FrameReader, setup_frames};
use crate::{ReaderError, Result};

/// Bytes requested from the port per read.
const READ_CHUNK: usize = 1024;

/// Chunks buffered between the pump thread and the frame reader.
const CHANNEL_CHUNKS: usize = 64;

/// How long `close` waits for a read already in progress.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type ByteStream = StreamReader<ReceiverStream<io::Result<Bytes>>, Bytes>;

/// Live provider reading a u-blox receiver over a serial port
pub struct SerialProvider {
    reader: Option<FrameReader<ByteStream>>,
    port: String,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
    close_timeout: Duration,
}

impl SerialProvider {
    /// Open the configured port, optionally enable the required messages, and
    /// start reading in the cleaning phase until `stop` is cancelled.
    pub fn open(config: &SerialConfig, stop: &CancellationToken) -> Result<Self> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| ReaderError::serial(&config.port, io::Error::from(e)))?;

        info!(
            port = %config.port,
            baud_rate = config.baud_rate,
            "Opened serial port"
        );

        if config.send_setup {
            configure_receiver(&mut port).map_err(|e| ReaderError::serial(&config.port, e))?;
            debug!("Sent message rate configuration");
        }

        Self::from_reader(port, config.port.clone(), stop)
    }

    /// Read frames from any blocking byte source until `stop` is cancelled.
    pub fn from_reader<R>(source: R, name: impl Into<String>, stop: &CancellationToken) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let port = name.into();
        let (tx, rx) = mpsc::channel(CHANNEL_CHUNKS);
        let cancel = stop.child_token();

        let pump_cancel = cancel.clone();
        let pump_name = port.clone();
        let pump = std::thread::Builder::new()
            .name("ublox-serial".to_string())
            .spawn(move || pump_bytes(source, tx, pump_cancel, pump_name))
            .map_err(|e| ReaderError::serial(port.clone(), e))?;

        let stream = StreamReader::new(ReceiverStream::new(rx));
        Ok(Self {
            reader: Some(FrameReader::new(stream, port.clone())),
            port,
            cancel,
            pump: Some(pump),
            close_timeout: CLOSE_TIMEOUT,
        })
    }

    /// Bound the wait for the reader thread when closing.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

/// Write the CFG-MSG frames enabling time, clock and subframe output.
pub fn configure_receiver<W: Write + ?Sized>(port: &mut W) -> io::Result<()> {
    for frame in setup_frames() {
        port.write_all(&frame)?;
    }
    port.flush()
}

fn pump_bytes<R: Read>(
    mut source: R,
    tx: mpsc::Sender<io::Result<Bytes>>,
    cancel: CancellationToken,
    name: String,
) {
    let mut buf = vec![0u8; READ_CHUNK];
    // No read is issued once the stop signal has fired.
    while !cancel.is_cancelled() {
        match source.read(&mut buf) {
            Ok(0) => {
                debug!("{} reached end of input", name);
                break;
            }
            Ok(n) => {
                trace!("Read {} bytes from {}", n, name);
                if cancel.is_cancelled() {
                    debug!("Discarding {} bytes read from {} after stop", n, name);
                    break;
                }
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    break;
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {}
            Err(e) => {
                error!("Read from {} failed: {}", name, e);
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    }
    debug!("Serial pump for {} stopped", name);
}

#[async_trait::async_trait]
impl Provider for SerialProvider {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        match self.reader.as_mut() {
            Some(reader) => reader.next_frame().await,
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.cancel.cancel();
        // Dropping the receiver unblocks a pump waiting on a full channel.
        self.reader.take();

        if let Some(handle) = self.pump.take() {
            let join = tokio::task::spawn_blocking(move || handle.join());
            tokio::time::timeout(self.close_timeout, join)
                .await
                .map_err(|_| ReaderError::Timeout { duration: self.close_timeout })?
                .map_err(|e| ReaderError::task_failed(format!("joining serial pump: {}", e)))?
                .map_err(|_| ReaderError::task_failed("serial pump panicked"))?;
        }
        info!("Closed serial port {}", self.port);
        Ok(())
    }

    fn source_name(&self) -> &str {
        &self.port
    }
}

impl Drop for SerialProvider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
