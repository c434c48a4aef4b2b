//! Event fabric: a topic exchange with durable queues.
//!
//! Publishers send messages with a dot-separated routing key
//! (`delivery.status.lost`). Each queue is bound to one or more patterns
//! where `*` matches exactly one word and `#` matches zero or more words.
//! A queue buffers every matching message until its consumer reads it, so
//! consumers that start late still see earlier messages. Delivery is
//! at-least-once from the consumer's point of view: handlers must be
//! idempotent.

pub mod broker;
pub mod consumer;
pub mod contracts;
pub mod error;
pub mod message;
pub mod topic;

pub use broker::{EventPublisher, InMemoryBroker, QueueReceiver};
pub use consumer::{MessageHandler, spawn_consumer};
pub use contracts::{
    BankMessage, DeliveryEventStatus, DeliveryStatusMessage, OrderMessage, StockMessage, topics,
};
pub use error::{MessagingError, Result};
pub use message::Message;
pub use topic::topic_matches;
