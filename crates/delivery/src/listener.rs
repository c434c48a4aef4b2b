//! Stops deliveries of cancelled orders.

use async_trait::async_trait;
use messaging::{Message, MessageHandler, OrderMessage, topics};
use tracing::{info, warn};

use crate::DeliveryService;

pub const ORDER_CANCELLED_QUEUE: &str = "delivery.order-cancelled";
pub const ORDER_CANCELLED_BINDINGS: [&str; 1] = [topics::ORDER_CANCELLED];

/// Consumes `order.cancelled` and moves the order's delivery to `CANCELLED`.
pub struct OrderCancellationListener {
    service: DeliveryService,
}

impl OrderCancellationListener {
    pub fn new(service: DeliveryService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for OrderCancellationListener {
    async fn handle(&self, message: Message) {
        let order: OrderMessage = match message.decode() {
            Ok(order) => order,
            Err(err) => {
                warn!(message_id = %message.message_id, error = %err, "undecodable order event");
                return;
            }
        };
        if let Some(delivery) = self
            .service
            .cancel_for_order(&order.order_number, &order.note)
            .await
        {
            info!(
                order_number = %order.order_number,
                delivery_id = %delivery.id,
                "delivery cancelled with its order"
            );
        }
    }
}
