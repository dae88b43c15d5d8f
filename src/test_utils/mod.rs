//! In-memory helpers for tests and benchmarks.

mod local_transport;

pub use local_transport::LocalTransport;
