//! Error types for the receiver reader.
//!
//! Every fallible operation in the crate returns [`ReaderError`]. The taxonomy
//! separates transport failures, which stop the whole pipeline, from everything
//! else, which is logged and skipped.
//!
//! ## Error Categories
//!
//! - **Serial Errors**: the byte source failed; fatal, no retry inside the core
//! - **File Errors**: capture files, table files or validation output
//! - **Frame Errors**: frame bytes too short to carry a header and trailer
//! - **Storage Errors**: the storage collaborator rejected a record
//! - **Config Errors**: missing or invalid configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use ublox_reader::ReaderError;
//!
//! let error = ReaderError::storage_failed("2024_ITA_18", "disk full");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for reader operations.
pub type Result<T, E = ReaderError> = std::result::Result<T, E>;

/// Main error type for reader operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReaderError {
    #[error("Serial communication failed on {port}")]
    SerialCommunication {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed frame: {details}")]
    Frame { details: String },

    #[error("Failed to store record in {table}: {reason}")]
    Storage {
        table: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Background task failed: {context}")]
    Task { context: String },
}

impl ReaderError {
    /// Transport failures end the pipeline; everything else is skipped or logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReaderError::SerialCommunication { .. })
    }

    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReaderError::SerialCommunication { .. } => false,
            ReaderError::File { .. } => false,
            ReaderError::Frame { .. } => false,
            ReaderError::Storage { .. } => true,
            ReaderError::Config { .. } => false,
            ReaderError::Timeout { .. } => true,
            ReaderError::Task { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ReaderError::SerialCommunication { .. } => vec![
                "Check the receiver is plugged in and powered",
                "Verify the serial port path and permissions",
                "Verify the configured baud rate matches the receiver",
            ],
            ReaderError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check directory permissions",
                "Ensure sufficient disk space",
            ],
            ReaderError::Frame { .. } => vec![
                "Check the receiver protocol output is UBX",
                "Verify the capture was recorded from the start of a frame",
            ],
            ReaderError::Storage { .. } => vec![
                "Check the storage directory is writable",
                "Retry the insert, stores ignore duplicate timestamps",
            ],
            ReaderError::Config { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Compare the file against the documented defaults",
            ],
            ReaderError::Timeout { .. } => {
                vec!["Configure a serial read timeout", "Check the receiver is still connected"]
            }
            ReaderError::Task { .. } => {
                vec!["Check the logs for a panic in a worker", "Restart the reader"]
            }
        }
    }

    /// Helper constructor for transport failures.
    pub fn serial(port: impl Into<String>, source: std::io::Error) -> Self {
        ReaderError::SerialCommunication { port: port.into(), source }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReaderError::File { path: path.into(), source }
    }

    /// Helper constructor for malformed frames.
    pub fn malformed_frame(details: impl Into<String>) -> Self {
        ReaderError::Frame { details: details.into() }
    }

    /// Helper constructor for storage errors.
    pub fn storage_failed(table: impl Into<String>, reason: impl Into<String>) -> Self {
        ReaderError::Storage { table: table.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for storage errors with source.
    pub fn storage_failed_with_source(
        table: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ReaderError::Storage { table: table.into(), reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        ReaderError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for failed background tasks.
    pub fn task_failed(context: impl Into<String>) -> Self {
        ReaderError::Task { context: context.into() }
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        ReaderError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for ReaderError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        ReaderError::Config { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn error_messages_keep_their_context(
            table in "[0-9]{4}_[A-Z]{3}_[0-9]{1,2}",
            reason in ".*",
            port in "/dev/tty[A-Z]{3}[0-9]",
        ) {
            let storage = ReaderError::storage_failed(table.clone(), reason.clone());
            let msg = storage.to_string();
            prop_assert!(msg.contains(&table));
            prop_assert!(msg.contains(&reason));

            let serial = ReaderError::serial(port.clone(), std::io::Error::other(reason.clone()));
            prop_assert!(serial.to_string().contains(&port));
            prop_assert!(serial.is_fatal());
        }

        #[test]
        fn io_errors_convert_to_file_errors(reason in ".*") {
            let converted: ReaderError = std::io::Error::new(std::io::ErrorKind::NotFound, reason.clone()).into();
            match converted {
                ReaderError::File { source, .. } => prop_assert_eq!(source.to_string(), reason),
                _ => prop_assert!(false, "Expected File error from io::Error conversion"),
            }
        }
    }

    #[test]
    fn only_transport_failures_are_fatal() {
        let serial = ReaderError::serial("/dev/ttyACM0", std::io::Error::other("unplugged"));
        let frame = ReaderError::malformed_frame("3 bytes");
        let storage = ReaderError::storage_failed("2024_ITA_18", "locked");
        let timeout = ReaderError::Timeout { duration: Duration::from_secs(1) };

        assert!(serial.is_fatal());
        assert!(!frame.is_fatal());
        assert!(!storage.is_fatal());
        assert!(!timeout.is_fatal());
    }

    #[test]
    fn recovery_methods_work() {
        let serial = ReaderError::serial("/dev/ttyACM0", std::io::Error::other("unplugged"));
        let storage = ReaderError::storage_failed("2024_ITA_18", "locked");

        assert!(!serial.is_retryable());
        assert!(storage.is_retryable());

        for suggestion in serial.recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
        assert!(!storage.recovery_suggestions().is_empty());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<ReaderError>();

        let error = ReaderError::invalid_config("workers must be positive");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn source_chain_is_preserved() {
        let inner = std::io::Error::other("relation does not exist");
        let error = ReaderError::storage_failed_with_source("2024_ITA_18", "insert", Box::new(inner));
        let source = std::error::Error::source(&error).expect("storage error should carry a source");
        assert!(source.to_string().contains("relation"));
    }
}
