//! # Understudy Upstream Calls
//!
//! Crate for calling the upstream nodes a node is configured with.
//!
//! ### Key Submodules:
//! - `transport`: the capability every transport satisfies, with an HTTP
//!   client over `reqwest` and a unary RPC client over `tonic`
//! - `invoker`: one call to one upstream, always ending in a `ResponseNode`
//! - `payload`: bodies sent along with upstream calls
//!
//! The transport for each target is chosen once, when the invokers are
//! built from configuration.

mod error;
pub mod invoker;
pub mod payload;
pub mod transport;

pub use error::{rpc_status, UpstreamError};
pub use invoker::{build_invokers, UpstreamInvoker, DEADLINE_EXCEEDED};
pub use payload::RequestBody;
pub use transport::{HttpTransport, OutboundCall, RpcTransport, Transport, TransportResponse};
