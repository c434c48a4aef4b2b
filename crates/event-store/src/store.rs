use async_trait::async_trait;

use crate::{EventEnvelope, EventStoreError, Result, StreamId, Version};

/// Options for appending events to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must be at. `None` skips the check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Expects the stream to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expects the stream not to exist yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// Storage for event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events to one stream atomically.
    ///
    /// Fails with `ConcurrencyConflict` when `options.expected_version` does
    /// not match. Returns the stream version after the append.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Returns every event of a stream in version order.
    async fn read_stream(&self, stream_id: &StreamId) -> Result<Vec<EventEnvelope>>;

    /// Returns the current version, or `None` if the stream does not exist.
    async fn stream_version(&self, stream_id: &StreamId) -> Result<Option<Version>>;

    /// Returns all events of the given type across streams, oldest first.
    async fn events_of_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;
}

/// Checks that a batch targets a single stream with consecutive versions.
pub(crate) fn validate_batch(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected = first.version;
    for event in &events[1..] {
        if event.stream_id != first.stream_id {
            return Err(EventStoreError::InvalidAppend(
                "all events in a batch must target the same stream".to_string(),
            ));
        }
        expected = expected.next();
        if event.version != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "versions must be consecutive: expected {expected}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}
