//! ## understudy-engine::orchestrator
//! **Per-request state machine**
//!
//! `Start -> FaultCheck -> {Fail, Proceed} -> Simulate -> FanOut -> Assemble`
//!
//! An `http_error` fault ends the request right after the check with no
//! upstream calls. Otherwise the latency sleep and the synthetic load run
//! together for the sampled duration, the upstreams are called and the node
//! for this request is assembled around their results.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use prometheus::IntGauge;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};
use understudy_config::{FaultKind, NodeConfig};
use understudy_core::prelude::*;
use understudy_telemetry::MetricsRecorder;
use understudy_upstream::{build_invokers, RequestBody, UpstreamInvoker, DEADLINE_EXCEEDED};

use super::{EngineError, FanOutScheduler};

/// Error reported by a node that failed on purpose.
pub const INJECTED_FAULT: &str = "Service error automatically injected";

/// Error reported when a failed child fails its parent.
pub const UPSTREAM_FAILED: &str = "upstream call failed";

/// Everything a node needs to answer requests. Shared by all of them.
pub struct RequestOrchestrator {
    config: NodeConfig,
    seeds: SeedSource,
    latency: LatencyModel,
    faults: FaultInjector,
    load: LoadGenerator,
    fanout: FanOutScheduler,
    metrics: Arc<MetricsRecorder>,
}

impl RequestOrchestrator {
    /// Builds a node from validated configuration, creating its transports
    /// and metrics registry. Must run inside a Tokio runtime.
    pub fn from_config(config: NodeConfig) -> Result<Self, EngineError> {
        config.check()?;
        let invokers = build_invokers(&config.upstream)?;
        let metrics = Arc::new(MetricsRecorder::new()?);
        Ok(Self::with_invokers(config, invokers, metrics))
    }

    /// Builds a node around ready-made invokers, in call order.
    pub fn with_invokers(
        config: NodeConfig,
        invokers: Vec<UpstreamInvoker>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let seed = config.seed_or_now();
        info!(seed, "Using seed");

        let fanout = FanOutScheduler::new(
            invokers,
            config.upstream.workers,
            RequestBody::from(&config.upstream),
        );

        Self {
            seeds: SeedSource::new(seed),
            latency: LatencyModel::from(&config.timing),
            faults: FaultInjector::from(&config.fault),
            load: LoadGenerator::from(&config.load),
            fanout,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn seed(&self) -> u64 {
        self.seeds.seed()
    }

    /// Handles one inbound request. Always produces a tree.
    #[instrument(skip_all, fields(node = %self.config.name, path = %inbound.path))]
    pub async fn handle(&self, inbound: InboundRequest) -> ResponseNode {
        let start_time = Utc::now();
        let mut ctx = RequestContext::new(inbound, self.seeds.next_request());
        if let Some(timeout) = self.config.server.request_timeout() {
            let deadline = ctx.started + timeout;
            ctx = ctx.with_deadline(deadline);
        }

        let node = self.run(&mut ctx, start_time).await;

        debug!(code = node.code, sequence = ctx.random.sequence, "Request complete");
        self.metrics.observe_request(node.code, ctx.started.elapsed());
        node
    }

    async fn run(&self, ctx: &mut RequestContext, start_time: DateTime<Utc>) -> ResponseNode {
        let node = ResponseNode::new(
            self.config.name.clone(),
            ctx.inbound.path_and_query(),
            NodeKind::Root,
        );
        let deadline = ctx.deadline;

        let fault = self.faults.check(&mut ctx.random.fault);
        let Some(outcome) = before_deadline(deadline, fault).await else {
            return self.expired(node, ctx, start_time);
        };
        match outcome {
            FaultOutcome::Failed { code } => {
                self.metrics.inc_injected_fault(FaultKind::HttpError.as_str());
                return node
                    .with_error(code, INJECTED_FAULT)
                    .with_duration(ctx.started.elapsed())
                    .with_times(start_time, Utc::now());
            }
            FaultOutcome::Delayed(_) => {
                self.metrics.inc_injected_fault(FaultKind::Delay.as_str());
            }
            FaultOutcome::Proceed => {}
        }

        let work = self.latency.sample(&mut ctx.random.timing);
        let load = self.load.generate(work, &mut ctx.random.load);
        let simulate = async {
            let ((), allocation) = tokio::join!(tokio::time::sleep(work), load);
            allocation
        };
        let Some(allocation) = before_deadline(deadline, simulate).await else {
            return self.expired(node, ctx, start_time);
        };
        let _held = HeldMemory::new(allocation, &self.metrics.memory_allocated);
        let own_duration = ctx.started.elapsed();

        if ctx.deadline_exceeded() {
            return self.expired(node, ctx, start_time);
        }

        let result = self.fanout.run(ctx).await;
        for child in result.nodes.iter().filter(|child| !child.is_success()) {
            self.metrics.inc_upstream_error(&child.uri);
        }

        let child_failed = result.nodes.iter().any(|child| !child.is_success());
        let mut node = node
            .with_body(self.config.message.clone())
            .with_duration(own_duration)
            .with_times(start_time, Utc::now());
        node.upstream_calls = result.nodes;

        if result.deadline_exceeded {
            node.with_error(504, DEADLINE_EXCEEDED)
        } else if child_failed && self.config.upstream.propagate_errors {
            node.with_error(500, UPSTREAM_FAILED)
        } else {
            node
        }
    }

    /// The node for a request whose deadline passed before its upstreams ran.
    fn expired(
        &self,
        node: ResponseNode,
        ctx: &RequestContext,
        start_time: DateTime<Utc>,
    ) -> ResponseNode {
        warn!("Request deadline passed before fan-out");
        node.with_error(504, DEADLINE_EXCEEDED)
            .with_duration(ctx.started.elapsed())
            .with_times(start_time, Utc::now())
    }
}

/// Runs `work` to completion, or until `deadline` when one is set.
async fn before_deadline<F: Future>(deadline: Option<Instant>, work: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, work).await.ok(),
        None => Some(work.await),
    }
}

/// Keeps the memory gauge in step with a request's allocation.
struct HeldMemory<'a> {
    allocation: MemoryAllocation,
    gauge: &'a IntGauge,
}

impl<'a> HeldMemory<'a> {
    fn new(allocation: MemoryAllocation, gauge: &'a IntGauge) -> Self {
        gauge.add(allocation.len() as i64);
        Self { allocation, gauge }
    }
}

impl Drop for HeldMemory<'_> {
    fn drop(&mut self) {
        self.gauge.sub(self.allocation.len() as i64);
    }
}
