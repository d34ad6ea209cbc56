//! Cloud backend: domain events, bed assignment and the remote log stream.
//!
//! The core only sees the [`EventSink`] and [`BedRegistry`] capabilities.
//! [`BackendClient`] implements both over signed HTTPS requests.

mod client;
mod payload;
mod sigv4;
mod sink;

pub use client::BackendClient;
pub use payload::{BedAssignment, EventPayload, LogBatch};
pub use sigv4::SigV4Signer;
pub use sink::{BedRegistry, EventSink};
