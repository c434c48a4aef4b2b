//! Refunds customers whose parcel never arrived.

use async_trait::async_trait;
use messaging::{DeliveryEventStatus, DeliveryStatusMessage, Message, MessageHandler, topics};
use tracing::{info, warn};

use crate::{Ledger, LedgerError, Result, Transaction};

/// Queue the refunder consumes.
pub const LOST_PACKAGE_QUEUE: &str = "ledger.lost-packages";

/// Binding patterns for [`LOST_PACKAGE_QUEUE`].
pub const LOST_PACKAGE_BINDINGS: [&str; 2] = [topics::DELIVERY_LOST, topics::DELIVERY_FAILED];

/// Consumes lost and failed delivery events and refunds the order's
/// outstanding payment.
///
/// Redelivered events are harmless: once the payment is fully refunded the
/// ledger returns the existing refund.
pub struct LostPackageRefunder {
    ledger: Ledger,
}

impl LostPackageRefunder {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Refunds the order named by a delivery event.
    ///
    /// Returns `None` for events that call for no refund: other statuses, and
    /// orders that never produced a real payment.
    pub async fn on_delivery_event(
        &self,
        event: &DeliveryStatusMessage,
    ) -> Result<Option<Transaction>> {
        if !matches!(
            event.status,
            DeliveryEventStatus::Lost | DeliveryEventStatus::Failed
        ) {
            return Ok(None);
        }

        let reason = format!("Lost package, delivery {}: {}", event.delivery_id, event.note);
        match self.ledger.refund(&event.order_number, None, &reason).await {
            Ok(refund) => Ok(Some(refund)),
            Err(LedgerError::PaymentNotFound(order_number)) => {
                info!(%order_number, "no payment to refund for lost delivery");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl MessageHandler for LostPackageRefunder {
    async fn handle(&self, message: Message) {
        let event: DeliveryStatusMessage = match message.decode() {
            Ok(event) => event,
            Err(err) => {
                warn!(message_id = %message.message_id, error = %err, "undecodable delivery event");
                return;
            }
        };

        if let Err(err) = self.on_delivery_event(&event).await {
            warn!(
                order_number = %event.order_number,
                delivery_id = %event.delivery_id,
                error = %err,
                "lost package refund failed"
            );
        }
    }
}
