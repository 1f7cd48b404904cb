mod error;
mod fanout;
mod orchestrator;

pub use self::{
    error::EngineError,
    fanout::{FanOutResult, FanOutScheduler},
    orchestrator::{RequestOrchestrator, INJECTED_FAULT, UPSTREAM_FAILED},
};

pub mod prelude {
    pub use super::{EngineError, FanOutScheduler, RequestOrchestrator};
}
