//! Unbuffered consumer: every event is its own request.

use crate::transport::{DeliveryRequest, Transport};

use super::{Consumer, DeliveryStats};

/// Sends each event straight to the transport.
pub struct ImmediateConsumer<T> {
    transport: T,
    stats: DeliveryStats,
}

impl<T: Transport> ImmediateConsumer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            stats: DeliveryStats::default(),
        }
    }

    /// Get current delivery statistics
    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }
}

impl<T: Transport> Consumer for ImmediateConsumer<T> {
    fn send(&mut self, payload: String) -> bool {
        self.stats.requests += 1;

        match self.transport.deliver(&DeliveryRequest::single(&payload)) {
            Ok(()) => {
                self.stats.events_sent += 1;
                true
            }
            Err(e) => {
                self.stats.failed_requests += 1;
                tracing::warn!(error = %e, "Failed to deliver event");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::transport::ContentEncoding;
    use std::sync::Mutex;

    struct StubTransport {
        accept: bool,
        seen: Mutex<Vec<DeliveryRequest>>,
    }

    impl Transport for StubTransport {
        fn deliver(&self, request: &DeliveryRequest) -> Result<()> {
            self.seen.lock().unwrap().push(request.clone());
            if self.accept {
                Ok(())
            } else {
                Err(Error::Delivery("API error (500): boom".to_string()))
            }
        }
    }

    fn stub(accept: bool) -> StubTransport {
        StubTransport {
            accept,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_send_forwards_each_event() {
        let mut consumer = ImmediateConsumer::new(stub(true));

        assert!(consumer.send(r#"{"n":1}"#.to_string()));
        assert!(consumer.send(r#"{"n":2}"#.to_string()));

        let seen = consumer.transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].encoding, ContentEncoding::Base64);
        assert_eq!(seen[0], DeliveryRequest::single(r#"{"n":1}"#));
        drop(seen);
        assert_eq!(consumer.stats().events_sent, 2);
    }

    #[test]
    fn test_send_reports_transport_failure() {
        let mut consumer = ImmediateConsumer::new(stub(false));
        assert!(!consumer.send("{}".to_string()));
        assert_eq!(consumer.stats().failed_requests, 1);
    }

    #[test]
    fn test_flush_and_close_are_noops() {
        let mut consumer = ImmediateConsumer::new(stub(false));
        assert!(consumer.flush());
        assert!(consumer.close());
        assert!(consumer.transport.seen.lock().unwrap().is_empty());
    }
}
