//! Customer notifications.
//!
//! Rendering and transport belong to an outside service; this side only
//! decides who is told what. Sending is best-effort: callers log a failure
//! and carry on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderNumber};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SagaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    OrderConfirmed,
    InsufficientStock,
    PaymentFailed,
    OrderCancelled,
    OrderRefunded,
    StatusUpdate,
    /// Parcel picked up, in transit or delivered.
    ShippingUpdate,
    PackageLost,
    /// Refund issued after a parcel went missing.
    LostPackageRefund,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: Channel,
    pub kind: NotificationKind,
    pub recipient: CustomerId,
    pub order_number: OrderNumber,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn email(
        kind: NotificationKind,
        recipient: &CustomerId,
        order_number: &OrderNumber,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Channel::Email, kind, recipient, order_number, message)
    }

    pub fn push(recipient: &CustomerId, order_number: &OrderNumber, message: impl Into<String>) -> Self {
        Self::new(
            Channel::Push,
            NotificationKind::StatusUpdate,
            recipient,
            order_number,
            message,
        )
    }

    fn new(
        channel: Channel,
        kind: NotificationKind,
        recipient: &CustomerId,
        order_number: &OrderNumber,
        message: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            kind,
            recipient: recipient.clone(),
            order_number: order_number.clone(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), SagaError>;
}

/// Notifier that keeps what it was asked to send.
///
/// Cloning shares the outbox.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail with `RemoteUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, recipient: &CustomerId) -> Vec<Notification> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|n| &n.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotifier {
    async fn send(&self, notification: Notification) -> Result<(), SagaError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(SagaError::RemoteUnavailable(
                "notification service unavailable".to_string(),
            ));
        }
        debug!(
            recipient = %notification.recipient,
            order_number = %notification.order_number,
            channel = ?notification.channel,
            kind = ?notification.kind,
            "notification queued"
        );
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
