//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Address, CustomerId, Money, OrderNumber};
use event_store::{StreamId, Version};

use crate::aggregate::Aggregate;

use super::{
    DeliveryUpdate, HistoryEntry, OrderError, OrderEvent, OrderLine, OrderStatus, PaymentStatus,
    PlaceOrder,
    events::{
        DeliveryRequestedData, OrderCancelledData, OrderPlacedData, PaymentFailedData,
        PaymentRefundedData, PaymentStartedData, PaymentSucceededData, StatusChangedData, StatusNotedData,
    },
};

/// Order aggregate root.
///
/// Holds the order's lines, addresses, payment and delivery references and
/// its append-only audit trail. The trail is derived from the event stream,
/// so it can never disagree with the recorded transitions.
#[derive(Debug, Clone, Default)]
pub struct Order {
    order_number: Option<OrderNumber>,
    version: Version,
    owner_id: Option<CustomerId>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_reference: Option<String>,
    refund_reference: Option<String>,
    delivery_id: Option<String>,
    tracking_number: Option<String>,
    lines: Vec<OrderLine>,
    total: Money,
    shipping_address: Address,
    billing_address: Address,
    payment_method: String,
    history: Vec<HistoryEntry>,
    placed_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn stream_id(&self) -> Option<StreamId> {
        self.order_number
            .as_ref()
            .map(|n| StreamId::new(n.as_str()))
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => {
                self.order_number = Some(data.order_number);
                self.owner_id = Some(data.owner_id);
                self.lines = data.lines;
                self.total = data.total;
                self.shipping_address = data.shipping_address;
                self.billing_address = data.billing_address;
                self.payment_method = data.payment_method;
                self.placed_at = Some(data.placed_at);
                self.transition(OrderStatus::Pending, "Order created", data.placed_at);
            }
            OrderEvent::PaymentStarted(_) => {
                self.payment_status = PaymentStatus::InProgress;
            }
            OrderEvent::PaymentSucceeded(data) => {
                self.payment_status = if data.simulated {
                    PaymentStatus::Simulated
                } else {
                    PaymentStatus::Paid
                };
                self.payment_reference = Some(data.transaction_id);
                self.transition(OrderStatus::Paid, data.note, data.paid_at);
            }
            OrderEvent::PaymentFailed(data) => {
                self.payment_status = PaymentStatus::Failed;
                self.transition(
                    OrderStatus::PaymentFailed,
                    format!("Payment failed: {}", data.reason),
                    data.failed_at,
                );
            }
            OrderEvent::DeliveryRequested(data) => {
                self.delivery_id = Some(data.delivery_id);
                self.tracking_number = data.tracking_number;
                self.transition(OrderStatus::Processing, "Delivery created", data.requested_at);
            }
            OrderEvent::StatusChanged(data) => {
                if let Some(delivery_id) = data.delivery_id {
                    self.delivery_id = Some(delivery_id);
                }
                self.transition(data.to, data.note, data.changed_at);
            }
            OrderEvent::StatusNoted(data) => {
                self.record(data.status, data.note, data.noted_at);
            }
            OrderEvent::OrderCancelled(data) => {
                self.transition(OrderStatus::Cancelled, data.reason, data.cancelled_at);
            }
            OrderEvent::PaymentRefunded(data) => {
                self.payment_status = PaymentStatus::Refunded;
                self.refund_reference = Some(data.refund_transaction_id);
                self.record(self.status, data.note, data.refunded_at);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn owner_id(&self) -> Option<&CustomerId> {
        self.owner_id.as_ref()
    }

    pub fn is_owned_by(&self, customer: &CustomerId) -> bool {
        self.owner_id.as_ref() == Some(customer)
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// Ledger transaction (or simulated reference) that paid for the order.
    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn refund_reference(&self) -> Option<&str> {
        self.refund_reference.as_deref()
    }

    pub fn delivery_id(&self) -> Option<&str> {
        self.delivery_id.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    /// Audit trail, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

// Command methods (return events)
impl Order {
    /// Records a new order.
    pub fn place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.order_number.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if cmd.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id.to_string(),
                });
            }
            if !line.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: line.product_id.to_string(),
                });
            }
        }
        let computed: Money = cmd.lines.iter().map(OrderLine::line_total).sum();
        if computed != cmd.total {
            return Err(OrderError::TotalMismatch {
                expected: computed,
                actual: cmd.total,
            });
        }
        if !cmd.shipping_address.is_deliverable() {
            return Err(OrderError::UndeliverableAddress);
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_number: cmd.order_number.clone(),
            owner_id: cmd.owner_id.clone(),
            lines: cmd.lines.clone(),
            total: cmd.total,
            shipping_address: cmd.shipping_address.clone(),
            billing_address: cmd.billing_address.clone(),
            payment_method: cmd.payment_method.clone(),
            placed_at: Utc::now(),
        })])
    }

    /// Marks the charge as started. Cancellation is refused until the
    /// payment succeeds or fails.
    pub fn begin_payment(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if self.payment_status == PaymentStatus::InProgress {
            return Ok(vec![]);
        }
        self.require_status(OrderStatus::Pending, "start payment")?;
        if self.payment_status != PaymentStatus::Pending {
            return Err(OrderError::InvalidTransition {
                status: self.status,
                action: "start payment",
            });
        }

        Ok(vec![OrderEvent::PaymentStarted(PaymentStartedData {
            amount: self.total,
            started_at: Utc::now(),
        })])
    }

    /// Records a successful payment. Repeating it with the same reference is a no-op.
    pub fn record_payment(
        &self,
        transaction_id: &str,
        simulated: bool,
        note: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.payment_reference.as_deref() == Some(transaction_id) {
            return Ok(vec![]);
        }
        self.require_status(OrderStatus::Pending, "record payment")?;

        Ok(vec![OrderEvent::PaymentSucceeded(PaymentSucceededData {
            transaction_id: transaction_id.to_string(),
            simulated,
            note: note.to_string(),
            paid_at: Utc::now(),
        })])
    }

    pub fn record_payment_failure(&self, reason: &str) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status == OrderStatus::PaymentFailed {
            return Ok(vec![]);
        }
        self.require_status(OrderStatus::Pending, "record payment failure")?;

        Ok(vec![OrderEvent::PaymentFailed(PaymentFailedData {
            reason: reason.to_string(),
            failed_at: Utc::now(),
        })])
    }

    /// Binds the delivery created for a paid order and moves it to `PROCESSING`.
    ///
    /// A no-op when the same delivery is already bound, which happens when
    /// the delivery's creation event was reconciled first.
    pub fn record_delivery(
        &self,
        delivery_id: &str,
        tracking_number: Option<&str>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match self.delivery_id.as_deref() {
            Some(bound) if bound == delivery_id => return Ok(vec![]),
            Some(bound) => {
                return Err(OrderError::DeliveryMismatch {
                    bound: bound.to_string(),
                    received: delivery_id.to_string(),
                });
            }
            None => {}
        }
        self.require_status(OrderStatus::Paid, "record delivery")?;

        Ok(vec![OrderEvent::DeliveryRequested(DeliveryRequestedData {
            delivery_id: delivery_id.to_string(),
            tracking_number: tracking_number.map(str::to_string),
            requested_at: Utc::now(),
        })])
    }

    /// Folds a delivery status update into the order.
    ///
    /// Rejects updates for cancelled or lost orders and updates carrying a
    /// delivery id other than the bound one. A refunded payment alone does
    /// not stop updates: a lost-package refund may settle before the loss
    /// itself is reconciled. An update repeating the current
    /// status only adds an audit row.
    pub fn reconcile_delivery(
        &self,
        update: &DeliveryUpdate,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::TerminalOrder {
                status: self.status,
            });
        }
        if let (Some(bound), Some(received)) = (&self.delivery_id, &update.delivery_id)
            && bound != received
        {
            return Err(OrderError::DeliveryMismatch {
                bound: bound.clone(),
                received: received.clone(),
            });
        }

        let now = Utc::now();
        if update.status == self.status {
            return Ok(vec![OrderEvent::StatusNoted(StatusNotedData {
                status: update.status,
                note: update.note.clone(),
                noted_at: now,
            })]);
        }

        let delivery_id = match self.delivery_id {
            None => update.delivery_id.clone(),
            Some(_) => None,
        };
        Ok(vec![OrderEvent::StatusChanged(StatusChangedData {
            from: self.status,
            to: update.status,
            delivery_id,
            note: update.note.clone(),
            changed_at: now,
        })])
    }

    /// Cancels the order on behalf of its owner.
    pub fn cancel(
        &self,
        requested_by: &CustomerId,
        reason: Option<&str>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.is_owned_by(requested_by) {
            return Err(OrderError::NotOwner);
        }
        if self.status == OrderStatus::Cancelled || self.payment_status == PaymentStatus::Refunded
        {
            return Err(OrderError::AlreadyCancelled);
        }
        if self.status == OrderStatus::Delivered {
            return Err(OrderError::AlreadyDelivered);
        }
        if self.payment_status == PaymentStatus::InProgress {
            return Err(OrderError::PaymentInProgress);
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or("Cancelled by user");
        Ok(vec![OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.to_string(),
            cancelled_by: requested_by.clone(),
            cancelled_at: Utc::now(),
        })])
    }

    /// Records that the payment was returned to the customer.
    ///
    /// Idempotent: a second refund notice for a refunded order is a no-op.
    pub fn record_refund(
        &self,
        refund_transaction_id: &str,
        note: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.payment_status == PaymentStatus::Refunded {
            return Ok(vec![]);
        }
        if self.payment_status != PaymentStatus::Paid {
            return Err(OrderError::NothingToRefund {
                payment_status: self.payment_status,
            });
        }

        Ok(vec![OrderEvent::PaymentRefunded(PaymentRefundedData {
            refund_transaction_id: refund_transaction_id.to_string(),
            note: note.to_string(),
            refunded_at: Utc::now(),
        })])
    }
}

// Event helpers
impl Order {
    fn require_status(&self, expected: OrderStatus, action: &'static str) -> Result<(), OrderError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                status: self.status,
                action,
            })
        }
    }

    fn transition(&mut self, status: OrderStatus, note: impl Into<String>, at: DateTime<Utc>) {
        self.status = status;
        self.record(status, note, at);
    }

    fn record(&mut self, status: OrderStatus, note: impl Into<String>, at: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            status,
            note: note.into(),
            recorded_at: at,
        });
        self.updated_at = Some(at);
    }
}
