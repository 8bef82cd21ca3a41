//! Batching consumer
//!
//! Buffers serialized envelopes in memory and sends them as a single
//! `data_list` request when:
//! - the buffer reaches `max_size`
//! - [`Consumer::flush`] or [`Consumer::close`] is called
//!
//! A failed request leaves the buffer exactly as it was, so a later flush
//! resends the same events in the same order.

use crate::transport::{DeliveryRequest, Transport};

use super::{Consumer, DeliveryStats};

/// Default number of events per request
pub const DEFAULT_MAX_SIZE: usize = 50;

/// Observable state of the buffer between calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Accumulating,
}

/// Buffers events and delivers them in batches.
pub struct BatchConsumer<T> {
    transport: T,
    buffer: Vec<String>,
    max_size: usize,
    stats: DeliveryStats,
}

impl<T: Transport> BatchConsumer<T> {
    /// Create a consumer that flushes every `max_size` events.
    ///
    /// A `max_size` of 0 is treated as 1.
    pub fn new(transport: T, max_size: usize) -> Self {
        Self {
            transport,
            buffer: Vec::new(),
            max_size: max_size.max(1),
            stats: DeliveryStats::default(),
        }
    }

    /// Create a consumer with the default batch size.
    pub fn with_default_size(transport: T) -> Self {
        Self::new(transport, DEFAULT_MAX_SIZE)
    }

    pub fn state(&self) -> BufferState {
        if self.buffer.is_empty() {
            BufferState::Empty
        } else {
            BufferState::Accumulating
        }
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get current delivery statistics
    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> Consumer for BatchConsumer<T> {
    fn send(&mut self, payload: String) -> bool {
        self.buffer.push(payload);
        tracing::trace!(buffered = self.buffer.len(), "Event buffered");

        if self.buffer.len() >= self.max_size {
            return self.flush();
        }
        true
    }

    fn flush(&mut self) -> bool {
        if self.buffer.is_empty() {
            return true;
        }

        let request = match DeliveryRequest::batch(&self.buffer) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode event batch");
                return false;
            }
        };

        self.stats.requests += 1;

        match self.transport.deliver(&request) {
            Ok(()) => {
                self.stats.events_sent += self.buffer.len();
                tracing::debug!(events = self.buffer.len(), "Delivered event batch");
                self.buffer.clear();
                true
            }
            Err(e) => {
                self.stats.failed_requests += 1;
                tracing::warn!(
                    events = self.buffer.len(),
                    error = %e,
                    "Failed to deliver event batch, keeping buffer"
                );
                false
            }
        }
    }
}
