use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::validate_batch;
use crate::{AppendOptions, EventEnvelope, EventStore, EventStoreError, Result, StreamId, Version};

/// In-memory event store.
///
/// A single write lock covers the version check and the append, so two
/// writers racing on one stream cannot both succeed.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<StreamId, Vec<EventEnvelope>>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events across all streams.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_batch(&events)?;
        let stream_id = events[0].stream_id.clone();
        let first_version = events[0].version;

        let mut streams = self.streams.write().await;
        let stream = streams.entry(stream_id.clone()).or_default();
        let current = stream.last().map(|e| e.version).unwrap_or_default();

        if let Some(expected) = options.expected_version
            && expected != current
        {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id,
                expected,
                actual: current,
            });
        }

        if first_version != current.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                stream_id,
                expected: current,
                actual: Version::new(first_version.as_i64() - 1),
            });
        }

        let last = events.last().map(|e| e.version).unwrap_or(current);
        tracing::trace!(%stream_id, count = events.len(), version = %last, "events appended");
        stream.extend(events);
        Ok(last)
    }

    async fn read_stream(&self, stream_id: &StreamId) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        Ok(streams.get(stream_id).cloned().unwrap_or_default())
    }

    async fn stream_version(&self, stream_id: &StreamId) -> Result<Option<Version>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(stream_id)
            .and_then(|events| events.last())
            .map(|e| e.version))
    }

    async fn events_of_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        let mut events: Vec<_> = streams
            .values()
            .flatten()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then_with(|| a.stream_id.cmp(&b.stream_id))
        });
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(stream: &str, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::new(
            StreamId::new(stream),
            "Order",
            event_type,
            Version::new(version),
            &serde_json::json!({"test": true}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn append_and_read_back_in_order() {
        let store = InMemoryEventStore::new();
        let stream = StreamId::new("ORD-1");

        let version = store
            .append(
                vec![event("ORD-1", 1, "Placed"), event("ORD-1", 2, "Paid")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        assert_eq!(version, Version::new(2));
        let events = store.read_stream(&stream).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, "Paid");
        assert_eq!(
            store.stream_version(&stream).await.unwrap(),
            Some(Version::new(2))
        );
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        store
            .append(vec![event("ORD-1", 1, "Placed")], AppendOptions::expect_new())
            .await
            .unwrap();

        let result = store
            .append(
                vec![event("ORD-1", 1, "Placed")],
                AppendOptions::expect_new(),
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn version_gap_is_rejected_without_expected_version() {
        let store = InMemoryEventStore::new();
        let result = store
            .append(vec![event("ORD-1", 3, "Placed")], AppendOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn mixed_stream_batch_is_invalid() {
        let store = InMemoryEventStore::new();
        let result = store
            .append(
                vec![event("ORD-1", 1, "Placed"), event("ORD-2", 2, "Placed")],
                AppendOptions::expect_new(),
            )
            .await;
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));

        let empty = store.append(vec![], AppendOptions::default()).await;
        assert!(matches!(empty, Err(EventStoreError::InvalidAppend(_))));
    }

    #[tokio::test]
    async fn events_of_type_spans_streams() {
        let store = InMemoryEventStore::new();
        for stream in ["ORD-1", "ORD-2"] {
            store
                .append(
                    vec![event(stream, 1, "Placed"), event(stream, 2, "Paid")],
                    AppendOptions::expect_new(),
                )
                .await
                .unwrap();
        }

        let placed = store.events_of_type("Placed").await.unwrap();
        assert_eq!(placed.len(), 2);
        assert_eq!(store.event_count().await, 4);
        assert!(
            store
                .stream_version(&StreamId::new("ORD-9"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
