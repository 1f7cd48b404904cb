//! Instrumented transports for pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use understudy_upstream::{OutboundCall, Transport, TransportResponse, UpstreamError, UpstreamInvoker};

/// Answers every call with `status` after `delay` and records how many
/// calls were in flight at once.
#[derive(Debug)]
pub struct MockTransport {
    delay: Duration,
    status: u16,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(delay: Duration, status: u16) -> Arc<Self> {
        Arc::new(Self {
            delay,
            status,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn ok_after(millis: u64) -> Arc<Self> {
        Self::new(Duration::from_millis(millis), 200)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, _call: OutboundCall) -> Result<TransportResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(TransportResponse {
            status: self.status,
            body: Bytes::from_static(b"ok"),
        })
    }
}

/// One invoker per `(uri, transport)` pair, in the given order.
pub fn invokers(
    targets: &[(&str, Arc<MockTransport>)],
    timeout: Duration,
) -> Vec<UpstreamInvoker> {
    targets
        .iter()
        .map(|(uri, transport)| {
            let transport: Arc<dyn Transport> = transport.clone();
            UpstreamInvoker::new(uri.parse().unwrap(), transport, timeout, true)
        })
        .collect()
}
