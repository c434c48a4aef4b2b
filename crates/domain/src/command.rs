//! Command handling infrastructure.

use std::marker::PhantomData;

use event_store::{AppendOptions, EventEnvelope, EventStore, StreamId, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// How many times a command is re-run after losing an optimistic concurrency race.
const MAX_CONFLICT_RETRIES: usize = 5;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were recorded. Empty when the command was a no-op.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// Loads aggregates from the event store and records the events commands produce.
///
/// Writes use optimistic concurrency. When another writer appended to the
/// same stream in between, the aggregate is reloaded and the command is
/// decided again against the fresh state, so invariants checked inside the
/// command always hold for the state the events are appended to.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds an aggregate by replaying its stream.
    ///
    /// Returns a default instance when the stream does not exist.
    pub async fn load(&self, stream_id: &StreamId) -> Result<A, DomainError> {
        let events = self.store.read_stream(stream_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning `None` if it doesn't exist.
    pub async fn load_existing(&self, stream_id: &StreamId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(stream_id).await?;
        Ok(aggregate.stream_id().map(|_| aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current state and returns the
    /// events to record or an error. It may run more than once when a
    /// concurrent writer wins the race.
    pub async fn execute<F>(
        &self,
        stream_id: &StreamId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;
        loop {
            let mut aggregate = self.load(stream_id).await?;
            let current_version = aggregate.version();

            let events = command_fn(&aggregate)?;
            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events,
                    new_version: current_version,
                });
            }

            let envelopes = self.build_envelopes(stream_id, current_version, &events)?;
            match self
                .store
                .append(envelopes, AppendOptions::expect_version(current_version))
                .await
            {
                Ok(new_version) => {
                    aggregate.apply_events(events.iter().cloned());
                    aggregate.set_version(new_version);
                    return Ok(CommandResult {
                        aggregate,
                        events,
                        new_version,
                    });
                }
                Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::debug!(%stream_id, attempt, "concurrent write detected, retrying command");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn build_envelopes(
        &self,
        stream_id: &StreamId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut version = current_version;
        events
            .iter()
            .map(|event| {
                version = version.next();
                EventEnvelope::new(
                    stream_id.clone(),
                    A::aggregate_type(),
                    event.event_type(),
                    version,
                    event,
                )
                .map_err(DomainError::from)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use event_store::InMemoryEventStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { name: String },
        Incremented,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Incremented => "CounterIncremented",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Counter {
        name: Option<String>,
        value: u32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter is capped at {0}")]
    struct Capped(u32);

    impl From<Capped> for DomainError {
        fn from(e: Capped) -> Self {
            DomainError::NotFound {
                aggregate_type: "Counter",
                id: e.to_string(),
            }
        }
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = Capped;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn stream_id(&self) -> Option<StreamId> {
            self.name.clone().map(StreamId::from)
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { name } => self.name = Some(name),
                CounterEvent::Incremented => self.value += 1,
            }
        }
    }

    fn increment(counter: &Counter) -> Result<Vec<CounterEvent>, Capped> {
        if counter.value >= 100 {
            return Err(Capped(100));
        }
        Ok(vec![CounterEvent::Incremented])
    }

    #[tokio::test]
    async fn execute_records_and_applies_events() {
        let handler: CommandHandler<_, Counter> = CommandHandler::new(InMemoryEventStore::new());
        let stream = StreamId::new("c-1");

        handler
            .execute(&stream, |_| {
                Ok(vec![CounterEvent::Opened {
                    name: "c-1".into(),
                }])
            })
            .await
            .unwrap();
        let result = handler.execute(&stream, increment).await.unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 1);
        assert_eq!(handler.load(&stream).await.unwrap().value, 1);
    }

    #[tokio::test]
    async fn empty_command_result_writes_nothing() {
        let handler: CommandHandler<_, Counter> = CommandHandler::new(InMemoryEventStore::new());
        let stream = StreamId::new("c-1");

        let result = handler.execute(&stream, |_| Ok(vec![])).await.unwrap();
        assert!(result.events.is_empty());
        assert!(handler.load_existing(&stream).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_commands_serialize_through_retries() {
        let handler: Arc<CommandHandler<_, Counter>> =
            Arc::new(CommandHandler::new(InMemoryEventStore::new()));
        let stream = StreamId::new("c-1");
        handler
            .execute(&stream, |_| {
                Ok(vec![CounterEvent::Opened {
                    name: "c-1".into(),
                }])
            })
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let handler = handler.clone();
            let stream = stream.clone();
            tasks.push(tokio::spawn(async move {
                handler.execute(&stream, increment).await.map(|_| ())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let counter = handler.load(&stream).await.unwrap();
        assert_eq!(counter.value, 4);
        assert_eq!(counter.version, Version::new(5));
    }
}
