//! Marks orders refunded when the ledger reports a refund.

use async_trait::async_trait;
use domain::{DomainError, Order, OrderError, OrderService, OrderStatus, PaymentStatus};
use event_store::EventStore;
use messaging::{BankMessage, Message, MessageHandler, topics};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::services::{Notification, NotificationKind, NotificationService};

/// Queue the settlement listener consumes.
pub const REFUND_SETTLEMENT_QUEUE: &str = "store.refund-settlement";

/// Binding patterns for [`REFUND_SETTLEMENT_QUEUE`].
pub const REFUND_SETTLEMENT_BINDINGS: [&str; 1] = [topics::REFUND_SUCCESS];

/// Records ledger refunds on their orders.
///
/// The order status is left as it is; only the payment becomes `REFUNDED`,
/// with an audit row naming the refund transaction. Repeats are no-ops.
/// A refund settling on an order that was not cancelled came from a lost
/// parcel, and the customer is emailed about it.
pub struct RefundSettlementListener<S: EventStore, N> {
    orders: OrderService<S>,
    notifier: N,
}

impl<S, N> RefundSettlementListener<S, N>
where
    S: EventStore,
    N: NotificationService,
{
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            orders: OrderService::new(store),
            notifier,
        }
    }

    /// Returns the updated order, or `None` when the refund does not concern
    /// a paid order this side knows about or was already recorded.
    pub async fn on_refund(&self, refund: &BankMessage) -> Result<Option<Order>> {
        if let Some(order) = self.orders.get(&refund.order_number).await?
            && order.payment_status() == PaymentStatus::Refunded
        {
            debug!(order_number = %refund.order_number, "refund already settled");
            return Ok(None);
        }

        let note = format!("Refund issued: {}", refund.transaction_id);
        match self
            .orders
            .record_refund(&refund.order_number, &refund.transaction_id, &note)
            .await
        {
            Ok(order) => {
                if order.status() != OrderStatus::Cancelled {
                    self.notify_lost_package_refund(refund).await;
                }
                Ok(Some(order))
            }
            Err(DomainError::NotFound { .. }) => {
                warn!(order_number = %refund.order_number, "refund for unknown order");
                Ok(None)
            }
            Err(DomainError::Order(OrderError::NothingToRefund { payment_status })) => {
                info!(
                    order_number = %refund.order_number,
                    %payment_status,
                    "refund does not match a paid order"
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn notify_lost_package_refund(&self, refund: &BankMessage) {
        let order_number = &refund.order_number;
        let email = Notification::email(
            NotificationKind::LostPackageRefund,
            &refund.owner_id,
            order_number,
            format!(
                "{} has been refunded for lost order {order_number} (transaction {})",
                refund.amount, refund.transaction_id
            ),
        );
        if let Err(err) = self.notifier.send(email).await {
            warn!(%order_number, error = %err, "refund email not sent");
        }
    }
}

#[async_trait]
impl<S, N> MessageHandler for RefundSettlementListener<S, N>
where
    S: EventStore + 'static,
    N: NotificationService + 'static,
{
    async fn handle(&self, message: Message) {
        let refund: BankMessage = match message.decode() {
            Ok(refund) => refund,
            Err(err) => {
                warn!(message_id = %message.message_id, error = %err, "undecodable refund event");
                return;
            }
        };

        match self.on_refund(&refund).await {
            Ok(Some(_)) => info!(
                order_number = %refund.order_number,
                refund_id = %refund.transaction_id,
                "refund settled on order"
            ),
            Ok(None) => {}
            Err(err) => warn!(
                order_number = %refund.order_number,
                error = %err,
                "refund settlement failed"
            ),
        }
    }
}
