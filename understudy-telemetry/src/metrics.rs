//! ## understudy-telemetry::metrics
//! **Prometheus registry for one node**

use std::fmt;
use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub requests: IntCounterVec,
    pub request_duration: Histogram,
    pub injected_faults: IntCounterVec,
    pub upstream_errors: IntCounterVec,
    /// Simulated memory currently held by in-flight requests.
    pub memory_allocated: IntGauge,
}

impl fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("memory_allocated", &self.memory_allocated.get())
            .finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("understudy_requests_total", "Requests handled, by status code"),
            &["code"],
        )?;
        let request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "understudy_request_duration_seconds",
                "Time to handle a request, fan-out included",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        let injected_faults = IntCounterVec::new(
            Opts::new("understudy_injected_faults_total", "Faults injected, by kind"),
            &["kind"],
        )?;
        let upstream_errors = IntCounterVec::new(
            Opts::new(
                "understudy_upstream_errors_total",
                "Upstream calls that did not succeed, by target",
            ),
            &["target"],
        )?;
        let memory_allocated = IntGauge::new(
            "understudy_memory_allocated_bytes",
            "Simulated memory currently held",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(injected_faults.clone()))?;
        registry.register(Box::new(upstream_errors.clone()))?;
        registry.register(Box::new(memory_allocated.clone()))?;

        Ok(Self {
            registry,
            requests,
            request_duration,
            injected_faults,
            upstream_errors,
            memory_allocated,
        })
    }

    pub fn observe_request(&self, code: u16, elapsed: Duration) {
        self.requests.with_label_values(&[code.to_string().as_str()]).inc();
        self.request_duration.observe(elapsed.as_secs_f64());
    }

    pub fn inc_injected_fault(&self, kind: &str) {
        self.injected_faults.with_label_values(&[kind]).inc();
    }

    pub fn inc_upstream_error(&self, target: &str) {
        self.upstream_errors.with_label_values(&[target]).inc();
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
