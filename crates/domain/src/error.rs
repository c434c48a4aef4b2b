//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// A command was rejected by the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("{aggregate_type} not found: {id}")]
    NotFound {
        aggregate_type: &'static str,
        id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns the order rejection, if this error is one.
    pub fn as_order_error(&self) -> Option<&OrderError> {
        match self {
            DomainError::Order(e) => Some(e),
            _ => None,
        }
    }
}
