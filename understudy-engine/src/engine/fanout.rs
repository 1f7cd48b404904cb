//! ## understudy-engine::fanout
//! **Bounded-concurrency calls to every upstream**
//!
//! Each run owns a fresh pool of `workers` permits. Every branch waits for a
//! permit, calls its upstream and yields exactly one node. Results come back
//! in configured order whatever order the calls complete in. A branch still
//! pending at the request deadline is dropped, which releases its permit,
//! and reported as abandoned.

use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout_at;
use tracing::{debug, instrument, warn};
use understudy_core::context::RequestContext;
use understudy_core::response::ResponseNode;
use understudy_upstream::{RequestBody, UpstreamInvoker};

pub struct FanOutScheduler {
    invokers: Vec<UpstreamInvoker>,
    workers: usize,
    body: RequestBody,
}

/// Children of one request, in configured order.
#[derive(Debug, Default)]
pub struct FanOutResult {
    pub nodes: Vec<ResponseNode>,
    /// At least one branch was abandoned at the request deadline.
    pub deadline_exceeded: bool,
}

impl FanOutScheduler {
    pub fn new(invokers: Vec<UpstreamInvoker>, workers: usize, body: RequestBody) -> Self {
        Self {
            invokers,
            workers: workers.max(1),
            body,
        }
    }

    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    #[instrument(skip_all, fields(targets = self.invokers.len(), workers = self.workers))]
    pub async fn run(&self, ctx: &mut RequestContext) -> FanOutResult {
        if self.invokers.is_empty() {
            return FanOutResult::default();
        }

        let bodies: Vec<Option<Bytes>> = self
            .invokers
            .iter()
            .map(|_| self.body.generate(&mut ctx.random.payload))
            .collect();

        let pool = Semaphore::new(self.workers);
        let inbound = &ctx.inbound;
        let deadline = ctx.deadline;

        let branches = self.invokers.iter().zip(bodies).map(|(invoker, body)| {
            let pool = &pool;
            async move {
                let call = async {
                    let _permit = pool.acquire().await.ok();
                    invoker.invoke(inbound, body).await
                };

                match deadline {
                    Some(deadline) => match timeout_at(deadline, call).await {
                        Ok(node) => (node, false),
                        Err(_) => {
                            warn!(upstream = %invoker.target().uri, "Abandoning upstream call at request deadline");
                            (invoker.abandoned(), true)
                        }
                    },
                    None => (call.await, false),
                }
            }
        });

        let (nodes, abandoned): (Vec<_>, Vec<_>) = join_all(branches).await.into_iter().unzip();
        let deadline_exceeded = abandoned.into_iter().any(|abandoned| abandoned);

        debug!(deadline_exceeded, "Fan-out complete");
        FanOutResult {
            nodes,
            deadline_exceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{invokers, MockTransport};
    use std::time::Duration;
    use tokio::time::Instant;
    use understudy_core::context::InboundRequest;
    use understudy_core::random::RequestRandom;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn context() -> RequestContext {
        RequestContext::new(InboundRequest::get("/"), RequestRandom::derive(11, 0))
    }

    fn uris(result: &FanOutResult) -> Vec<&str> {
        result.nodes.iter().map(|node| node.uri.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn children_keep_configured_order() {
        let scheduler = FanOutScheduler::new(
            invokers(
                &[
                    ("http://slow:1", MockTransport::ok_after(30)),
                    ("http://fast:2", MockTransport::ok_after(10)),
                    ("http://middle:3", MockTransport::ok_after(20)),
                ],
                TIMEOUT,
            ),
            3,
            RequestBody::Empty,
        );

        let result = scheduler.run(&mut context()).await;
        assert_eq!(uris(&result), vec!["http://slow:1", "http://fast:2", "http://middle:3"]);
        assert!(result.nodes.iter().all(ResponseNode::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_calls_never_exceed_workers() {
        let shared = MockTransport::ok_after(25);
        let scheduler = FanOutScheduler::new(
            invokers(
                &[
                    ("http://a:1", shared.clone()),
                    ("http://b:2", shared.clone()),
                    ("http://c:3", shared.clone()),
                ],
                TIMEOUT,
            ),
            2,
            RequestBody::Empty,
        );

        let result = scheduler.run(&mut context()).await;
        assert_eq!(result.nodes.len(), 3);
        assert_eq!(shared.calls(), 3);
        assert_eq!(shared.peak(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn one_worker_runs_sequentially() {
        let targets = [
            ("http://a:1", MockTransport::ok_after(50)),
            ("http://b:2", MockTransport::ok_after(50)),
            ("http://c:3", MockTransport::ok_after(50)),
        ];

        let sequential = FanOutScheduler::new(invokers(&targets, TIMEOUT), 1, RequestBody::Empty);
        let start = Instant::now();
        sequential.run(&mut context()).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(160), "took {elapsed:?}");

        let parallel = FanOutScheduler::new(invokers(&targets, TIMEOUT), 3, RequestBody::Empty);
        let start = Instant::now();
        parallel.run(&mut context()).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(60), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_isolated_to_its_branch() {
        let scheduler = FanOutScheduler::new(
            invokers(
                &[
                    ("http://a:1", MockTransport::ok_after(10)),
                    ("http://stuck:2", MockTransport::ok_after(5_000)),
                    ("http://c:3", MockTransport::ok_after(10)),
                ],
                Duration::from_millis(100),
            ),
            3,
            RequestBody::Empty,
        );

        let result = scheduler.run(&mut context()).await;
        let codes: Vec<_> = result.nodes.iter().map(|node| node.code).collect();
        assert_eq!(codes, vec![200, 504, 200]);
        assert!(result.nodes[1].error.as_deref().unwrap().contains("timed out"));
        assert_eq!(result.nodes[0].body, "ok");
        assert!(!result.deadline_exceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn request_deadline_abandons_pending_branches() {
        let scheduler = FanOutScheduler::new(
            invokers(
                &[
                    ("http://a:1", MockTransport::ok_after(10)),
                    ("http://slow:2", MockTransport::ok_after(500)),
                    ("http://queued:3", MockTransport::ok_after(10)),
                ],
                TIMEOUT,
            ),
            1,
            RequestBody::Empty,
        );

        let mut ctx = context().with_deadline(Instant::now() + Duration::from_millis(100));
        let result = scheduler.run(&mut ctx).await;

        assert!(result.deadline_exceeded);
        let codes: Vec<_> = result.nodes.iter().map(|node| node.code).collect();
        assert_eq!(codes, vec![200, 504, 504]);
        assert_eq!(
            result.nodes[2].error.as_deref(),
            Some(understudy_upstream::DEADLINE_EXCEEDED)
        );
    }

    #[tokio::test]
    async fn no_targets_means_no_children() {
        let scheduler = FanOutScheduler::new(Vec::new(), 4, RequestBody::Empty);
        let result = scheduler.run(&mut context()).await;
        assert!(result.nodes.is_empty());
        assert!(!result.deadline_exceeded);
    }
}
