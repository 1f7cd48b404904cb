//! # Understudy Engine
//!
//! The per-request pipeline of a node: fault check, simulated work, bounded
//! fan-out to upstreams and assembly of the response tree.

pub mod engine;

#[cfg(test)]
mod testing;

pub use engine::{EngineError, FanOutResult, FanOutScheduler, RequestOrchestrator};
