//! Core aggregate and domain event traits.

use event_store::{StreamId, Version};
use serde::{Serialize, de::DeserializeOwned};

/// A fact that happened to an aggregate, named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Event type name, used for storage and filtering.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced aggregate.
///
/// State is rebuilt by replaying events through `apply`, which must be pure
/// and infallible. Commands are plain methods that inspect the current state
/// and return the events to record, or an error.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;
    type Error: std::error::Error + Send + Sync;

    /// Stream type name, e.g. `Order`.
    fn aggregate_type() -> &'static str;

    /// Stream this aggregate lives in, `None` before its first event.
    fn stream_id(&self) -> Option<StreamId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
