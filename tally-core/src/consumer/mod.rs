//! Delivery consumers
//!
//! A consumer takes serialized envelopes from the [`Tracker`](crate::Tracker)
//! and gets them to the collector or to disk. Three variants share the
//! [`Consumer`] contract:
//!
//! - [`ImmediateConsumer`]: one transport request per event
//! - [`BatchConsumer`]: buffers events, sends them as one gzipped request
//!   when the buffer fills or on [`Consumer::flush`]
//! - [`FileConsumer`]: appends one JSON line per event to a local file
//!
//! ## Failure semantics
//!
//! Delivery problems never panic and never surface as errors here; they are
//! logged and reported as `false`. The batch consumer keeps its buffer on a
//! failed flush so the next flush retries the same events.
//!
//! ## Usage
//!
//! Select the consumer in `~/.config/tally/config.toml`:
//!
//! ```toml
//! [consumer]
//! kind = "batch"
//! server_url = "https://collector.example.com/sa"
//! max_size = 50
//! ```

mod batch;
mod file;
mod immediate;

pub use batch::{BatchConsumer, BufferState};
pub use file::FileConsumer;
pub use immediate::ImmediateConsumer;

use crate::config::{ConsumerConfig, ConsumerKind};
use crate::error::{Error, Result};
use crate::transport::HttpTransport;

/// Accepts serialized envelopes for delivery.
///
/// Every method reports success as a boolean; `false` means the payloads
/// involved did not reach their destination.
pub trait Consumer: Send {
    /// Hand over one serialized envelope.
    fn send(&mut self, payload: String) -> bool;

    /// Deliver anything buffered. Unbuffered consumers have nothing to do.
    fn flush(&mut self) -> bool {
        true
    }

    /// Deliver anything buffered and release resources.
    fn close(&mut self) -> bool {
        self.flush()
    }
}

impl<C: Consumer + ?Sized> Consumer for Box<C> {
    fn send(&mut self, payload: String) -> bool {
        (**self).send(payload)
    }

    fn flush(&mut self) -> bool {
        (**self).flush()
    }

    fn close(&mut self) -> bool {
        (**self).close()
    }
}

/// Counters kept by network consumers
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Events the collector confirmed
    pub events_sent: usize,
    /// Transport requests made
    pub requests: usize,
    /// Transport requests that failed
    pub failed_requests: usize,
}

/// Build the consumer selected by `config`.
pub fn from_config(config: &ConsumerConfig) -> Result<Box<dyn Consumer>> {
    config.validate()?;

    let consumer: Box<dyn Consumer> = match config.kind {
        ConsumerKind::Immediate => Box::new(ImmediateConsumer::new(HttpTransport::new(config)?)),
        ConsumerKind::Batch => Box::new(BatchConsumer::new(
            HttpTransport::new(config)?,
            config.max_size,
        )),
        ConsumerKind::File => {
            let path = config.file_path.as_ref().ok_or_else(|| {
                Error::Config("consumer.file_path is required for the file consumer".to_string())
            })?;
            Box::new(FileConsumer::open(path))
        }
    };

    tracing::info!(kind = ?config.kind, "Consumer created");
    Ok(consumer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_from_config_rejects_invalid() {
        assert!(from_config(&ConsumerConfig::default()).is_err());
    }

    #[test]
    fn test_from_config_builds_each_kind() {
        let dir = tempfile::tempdir().unwrap();

        for kind in [ConsumerKind::Immediate, ConsumerKind::Batch, ConsumerKind::File] {
            let config = ConsumerConfig {
                kind,
                server_url: Some("http://127.0.0.1:9/sa".to_string()),
                file_path: Some(dir.path().join("events.log")),
                ..Default::default()
            };
            assert!(from_config(&config).is_ok(), "{:?}", kind);
        }
    }

    #[test]
    fn test_file_consumer_from_config_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("events.log");
        let config = ConsumerConfig {
            kind: ConsumerKind::File,
            file_path: Some(path.clone()),
            ..Default::default()
        };

        let mut consumer = from_config(&config).unwrap();
        assert!(consumer.send("{}".to_string()));
        assert!(consumer.close());
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}\n");
    }

    #[test]
    fn test_delivery_stats_default() {
        let stats = DeliveryStats::default();
        assert_eq!(stats.events_sent, 0);
        assert_eq!(stats.requests, 0);
    }
}
