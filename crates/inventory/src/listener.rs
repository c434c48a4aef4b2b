//! Releases stock held for cancelled orders.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use messaging::{Message, MessageHandler, OrderMessage, topics};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::Inventory;

pub const ORDER_CANCELLED_QUEUE: &str = "inventory.order-cancelled";
pub const ORDER_CANCELLED_BINDINGS: [&str; 1] = [topics::ORDER_CANCELLED];

/// Consumes `order.cancelled` and releases the order's pending reservations.
pub struct OrderCancellationListener {
    inventory: Inventory,
}

impl OrderCancellationListener {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
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
        let released = self.inventory.release(&order.order_number).await;
        info!(
            order_number = %order.order_number,
            released = released.len(),
            "stock released for cancelled order"
        );
    }
}

/// Periodically releases reservations whose hold has run out.
pub fn spawn_expiry_sweep(inventory: Inventory, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let expired = inventory.release_expired(Utc::now()).await;
            if !expired.is_empty() {
                info!(count = expired.len(), "reservation sweep released stock");
            }
        }
    })
}
