//! Order fulfillment coordination.
//!
//! The [`OrderSaga`] is the synchronous entry point: it places an order,
//! checks and reserves stock, takes payment, then asks for a delivery,
//! releasing the reservations again if payment fails. Everything after that
//! is choreography: the [`DeliveryStatusReconciler`] folds delivery status
//! events into orders and the [`RefundSettlementListener`] records refunds
//! the ledger issued on its own.

pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod retry;
pub mod services;
pub mod settlement;

pub use error::{ErrorKind, Result, SagaError};
pub use orchestrator::{
    CancelResult, Collaborators, CreateOrderRequest, OrderItem, OrderSaga, SagaConfig,
};
pub use reconciler::{
    AbandonedEvent, DELIVERY_STATUS_BINDINGS, DELIVERY_STATUS_QUEUE, DeliveryStatusReconciler,
    ReconcileOutcome, order_status_for,
};
pub use retry::RetryPolicy;
pub use services::{
    Channel, InMemoryNotifier, InventoryService, Notification, NotificationKind,
    NotificationService, PaymentResult, PaymentService, ReservationItem, ShipmentRequest,
    ShipmentResult, ShippingService,
};
pub use settlement::{REFUND_SETTLEMENT_BINDINGS, REFUND_SETTLEMENT_QUEUE, RefundSettlementListener};
