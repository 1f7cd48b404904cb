//! # understudy-core
//!
//! Request-local building blocks of a simulated service node.
//!
//! ### Key Submodules:
//! - `random`: per-request seeded streams derived from the node seed
//! - `timing`: percentile based latency model
//! - `fault`: probabilistic fault injection
//! - `load`: time-boxed CPU and memory load
//! - `context`: the inbound request and its deadline
//! - `response`: the recursive response tree
//!
//! Nothing in this crate is shared between requests except immutable models
//! built once from configuration.

pub mod context;
pub mod fault;
pub mod load;
pub mod random;
pub mod response;
pub mod timing;

pub mod prelude {
    pub use crate::context::{InboundRequest, RequestContext};
    pub use crate::fault::{FaultInjector, FaultOutcome, SecondaryFault};
    pub use crate::load::{CpuLoad, LoadGenerator, MemoryAllocation, MemoryLoad};
    pub use crate::random::{RequestRandom, SeedSource};
    pub use crate::response::{NodeKind, ResponseNode};
    pub use crate::timing::LatencyModel;
}
