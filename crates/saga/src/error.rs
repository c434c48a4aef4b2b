//! Saga error types.
//!
//! Every failure a collaborator reports is folded into one of a small set of
//! kinds. The kind decides what happens next: validation failures go back to
//! the caller, missing prerequisites are retried, foreign events are dropped,
//! and unavailable collaborators are logged.

use delivery::DeliveryError;
use domain::{DomainError, OrderError};
use inventory::InventoryError;
use ledger::LedgerError;
use thiserror::Error;

/// Classification of a [`SagaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InsufficientResource,
    NotReady,
    ForeignEvent,
    RemoteUnavailable,
    NotFound,
    Forbidden,
    InvalidState,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InsufficientResource => "insufficient_resource",
            ErrorKind::NotReady => "not_ready",
            ErrorKind::ForeignEvent => "foreign_event",
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors raised while running the order saga or reconciling events.
#[derive(Debug, Clone, Error)]
pub enum SagaError {
    /// The request is malformed; retrying it cannot succeed.
    #[error("{0}")]
    Validation(String),

    /// Stock or funds ran short.
    #[error("{0}")]
    InsufficientResource(String),

    /// A record the event refers to does not exist yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The event does not apply to the record it names.
    #[error("Ignored event: {0}")]
    ForeignEvent(String),

    #[error("Service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// The record is in a state that does not allow the operation.
    #[error("{0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SagaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::Validation(_) => ErrorKind::Validation,
            SagaError::InsufficientResource(_) => ErrorKind::InsufficientResource,
            SagaError::NotReady(_) => ErrorKind::NotReady,
            SagaError::ForeignEvent(_) => ErrorKind::ForeignEvent,
            SagaError::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            SagaError::NotFound(_) => ErrorKind::NotFound,
            SagaError::Forbidden(_) => ErrorKind::Forbidden,
            SagaError::InvalidState(_) => ErrorKind::InvalidState,
            SagaError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only a missing prerequisite is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::NotReady
    }

    /// Prefixes the message, keeping the kind.
    pub fn context(self, prefix: &str) -> Self {
        let wrap = |message: String| format!("{prefix}: {message}");
        match self {
            SagaError::Validation(m) => SagaError::Validation(wrap(m)),
            SagaError::InsufficientResource(m) => SagaError::InsufficientResource(wrap(m)),
            SagaError::NotReady(m) => SagaError::NotReady(wrap(m)),
            SagaError::ForeignEvent(m) => SagaError::ForeignEvent(wrap(m)),
            SagaError::RemoteUnavailable(m) => SagaError::RemoteUnavailable(wrap(m)),
            SagaError::NotFound(m) => SagaError::NotFound(wrap(m)),
            SagaError::Forbidden(m) => SagaError::Forbidden(wrap(m)),
            SagaError::InvalidState(m) => SagaError::InvalidState(wrap(m)),
            SagaError::Internal(m) => SagaError::Internal(wrap(m)),
        }
    }
}

impl From<DomainError> for SagaError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::NotFound { .. } => SagaError::NotFound(message),
            DomainError::Order(order) => match order {
                OrderError::NotOwner => SagaError::Forbidden(order.to_string()),
                OrderError::NoLines
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
                | OrderError::TotalMismatch { .. }
                | OrderError::UndeliverableAddress => SagaError::Validation(order.to_string()),
                OrderError::DeliveryMismatch { .. } => SagaError::ForeignEvent(order.to_string()),
                OrderError::TerminalOrder { .. } => SagaError::ForeignEvent(order.to_string()),
                OrderError::AlreadyPlaced
                | OrderError::InvalidTransition { .. }
                | OrderError::AlreadyCancelled
                | OrderError::AlreadyDelivered
                | OrderError::PaymentInProgress
                | OrderError::NothingToRefund { .. } => SagaError::InvalidState(order.to_string()),
            },
            DomainError::EventStore(_) | DomainError::Serialization(_) => {
                SagaError::Internal(message)
            }
        }
    }
}

impl From<InventoryError> for SagaError {
    fn from(err: InventoryError) -> Self {
        let message = err.to_string();
        match err {
            InventoryError::InsufficientStock { .. } => SagaError::InsufficientResource(message),
            InventoryError::InvalidQuantity(_) => SagaError::Validation(message),
            InventoryError::NoReservations(_) => SagaError::InvalidState(message),
            InventoryError::UnknownWarehouse(_) => SagaError::NotFound(message),
            InventoryError::WarehouseExists(_) => SagaError::InvalidState(message),
            InventoryError::Messaging(_) => SagaError::RemoteUnavailable(message),
        }
    }
}

impl From<LedgerError> for SagaError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::InsufficientFunds { .. } => SagaError::InsufficientResource(message),
            LedgerError::InvalidAmount(_)
            | LedgerError::CurrencyMismatch { .. }
            | LedgerError::RefundExceedsPayment { .. } => SagaError::Validation(message),
            LedgerError::AccountNotFound(_) | LedgerError::PaymentNotFound(_) => {
                SagaError::NotFound(message)
            }
            LedgerError::AccountInactive(_) | LedgerError::AccountExists(_) => {
                SagaError::InvalidState(message)
            }
            LedgerError::Messaging(_) => SagaError::RemoteUnavailable(message),
        }
    }
}

impl From<DeliveryError> for SagaError {
    fn from(err: DeliveryError) -> Self {
        let message = err.to_string();
        match err {
            DeliveryError::NotFound(_) | DeliveryError::NoDeliveryForOrder(_) => {
                SagaError::NotFound(message)
            }
            DeliveryError::InvalidTransition { .. } => SagaError::InvalidState(message),
            DeliveryError::InvalidProbability(_) | DeliveryError::UndeliverableAddress => {
                SagaError::Validation(message)
            }
            DeliveryError::Messaging(_) => SagaError::RemoteUnavailable(message),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderNumber, ProductId};

    #[test]
    fn only_not_ready_is_retried() {
        assert!(SagaError::NotReady("order missing".into()).is_retryable());
        for err in [
            SagaError::Validation("x".into()),
            SagaError::ForeignEvent("x".into()),
            SagaError::RemoteUnavailable("x".into()),
            SagaError::Internal("x".into()),
        ] {
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn collaborator_errors_are_classified() {
        let stock: SagaError = InventoryError::InsufficientStock {
            product_id: ProductId::new("P-1"),
            requested: 3,
        }
        .into();
        assert_eq!(stock.kind(), ErrorKind::InsufficientResource);

        let funds: SagaError = LedgerError::InsufficientFunds {
            account: "ACC-1".into(),
            balance: Money::from_cents(100),
            requested: Money::from_cents(500),
        }
        .into();
        assert_eq!(funds.kind(), ErrorKind::InsufficientResource);

        let owner: SagaError = DomainError::Order(OrderError::NotOwner).into();
        assert_eq!(owner.kind(), ErrorKind::Forbidden);

        let missing: SagaError = DomainError::NotFound {
            aggregate_type: "Order",
            id: OrderNumber::new("ORD-1").to_string(),
        }
        .into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn context_keeps_kind() {
        let err = SagaError::InsufficientResource("balance 1.00".into()).context("Payment failed");
        assert_eq!(err.kind(), ErrorKind::InsufficientResource);
        assert_eq!(err.to_string(), "Payment failed: balance 1.00");
    }
}
