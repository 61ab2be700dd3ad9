//! The delivery pipeline: batches pending payloads out of the durable store,
//! sends them through a transport, and applies per-event retry/eviction
//! semantics. At-least-once: an event leaves the store only on success or a
//! non-retryable failure.

mod batcher;
mod callback;
mod config;
mod emitter;
mod request;
mod transport;

pub use batcher::partition;
pub use callback::RequestCallback;
pub use config::{BatchPolicy, EmitterConfig, Method};
pub use emitter::{EmitError, Emitter};
pub use request::{Request, RequestResult};
pub use transport::{HttpTransport, MockTransport, Transport};
