//! Append-only event journal.
//!
//! Streams are keyed by a string identifier (an order number, for orders) and
//! guarded by optimistic concurrency: every append states the version it
//! expects the stream to be at, and concurrent writers to the same stream are
//! forced to reload and retry.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventId, StreamId, Version};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore};
