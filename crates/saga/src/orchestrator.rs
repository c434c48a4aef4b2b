//! The order saga: places an order and drives it through stock, payment and
//! delivery, compensating when payment fails.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{Address, CustomerId, OrderNumber, ProductId};
use domain::{
    Catalog, DomainError, Order, OrderError, OrderLine, OrderService, OrderStatus, PaymentStatus,
    PlaceOrder,
};
use event_store::EventStore;
use messaging::{EventPublisher, Message, OrderMessage, topics};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{Result, SagaError};
use crate::services::{
    InventoryService, Notification, NotificationKind, NotificationService, PaymentResult,
    PaymentService, ReservationItem, ShipmentRequest, ShippingService,
};

/// Attempts at drawing an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

const STEP_CHECK_STOCK: &str = "check_stock";
const STEP_RESERVE_STOCK: &str = "reserve_stock";
const STEP_PAYMENT: &str = "payment";
const STEP_DELIVERY: &str = "delivery";

#[derive(Debug, Clone, Default)]
pub struct SagaConfig {
    /// Demo mode: a failed payment is recorded as a simulated success
    /// instead of failing the order. No money moves.
    pub simulate_payment_on_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub owner_id: CustomerId,
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
    /// Defaults to the shipping address.
    pub billing_address: Option<Address>,
    pub payment_method: String,
}

/// Outcome of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    pub order_number: OrderNumber,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub refund_transaction_id: Option<String>,
    pub refund_processed: bool,
}

/// Everything the saga calls besides the order store.
pub struct Collaborators<I, P, Sh, N> {
    pub catalog: Arc<dyn Catalog>,
    pub inventory: I,
    pub payment: P,
    pub shipping: Sh,
    pub notifier: N,
    pub publisher: Arc<dyn EventPublisher>,
}

/// Orchestrates order placement and cancellation.
///
/// Each step is persisted on the order before the next one runs. Stock
/// failures are reported before any money moves; a payment failure releases
/// the order's reservations; delivery creation and notifications are
/// best-effort.
pub struct OrderSaga<S, I, P, Sh, N>
where
    S: EventStore,
{
    orders: OrderService<S>,
    catalog: Arc<dyn Catalog>,
    inventory: I,
    payment: P,
    shipping: Sh,
    notifier: N,
    publisher: Arc<dyn EventPublisher>,
    config: SagaConfig,
}

impl<S, I, P, Sh, N> OrderSaga<S, I, P, Sh, N>
where
    S: EventStore,
    I: InventoryService,
    P: PaymentService,
    Sh: ShippingService,
    N: NotificationService,
{
    pub fn new(store: S, collaborators: Collaborators<I, P, Sh, N>, config: SagaConfig) -> Self {
        Self {
            orders: OrderService::new(store),
            catalog: collaborators.catalog,
            inventory: collaborators.inventory,
            payment: collaborators.payment,
            shipping: collaborators.shipping,
            notifier: collaborators.notifier,
            publisher: collaborators.publisher,
            config,
        }
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Places an order and runs it through stock, payment and delivery.
    ///
    /// Returns the order as it stands after the last step. Stock shortfalls
    /// and payment failures are returned as errors once compensated.
    #[tracing::instrument(skip(self, request), fields(owner = %request.owner_id, order_number))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.run_create(request).await;
        metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    async fn run_create(&self, request: CreateOrderRequest) -> Result<Order> {
        let lines = self.price_items(&request.items).await?;
        let items: Vec<ReservationItem> = lines
            .iter()
            .map(|line| ReservationItem {
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
            })
            .collect();

        let order = self.place(&request, lines).await?;
        let order_number = order_number_of(&order)?;
        tracing::Span::current().record("order_number", tracing::field::display(&order_number));
        metrics::counter!("orders_created_total").increment(1);
        info!(total = %order.total(), "order created");
        self.announce(topics::ORDER_CREATED, &order, "Order created")
            .await;

        info!(step = STEP_CHECK_STOCK, "saga step started");
        if let Err(err) = self.inventory.check_stock(&items).await {
            return Err(self.stock_failed(&order, err).await);
        }

        info!(step = STEP_RESERVE_STOCK, "saga step started");
        if let Err(err) = self.inventory.reserve(&order_number, &items).await {
            self.release_stock(&order_number).await;
            return Err(self.stock_failed(&order, err).await);
        }

        info!(step = STEP_PAYMENT, "saga step started");
        let order = match self.orders.begin_payment(&order_number).await {
            Ok(order) => order,
            Err(err) => {
                warn!(error = %err, "order changed before payment, releasing stock");
                self.release_stock(&order_number).await;
                return Err(err.into());
            }
        };
        let owner = request.owner_id;
        let order = match self.payment.charge(&order_number, &owner, order.total()).await {
            Ok(paid) => match self
                .orders
                .record_payment(&order_number, &paid.transaction_id, false, "Payment successful")
                .await
            {
                Ok(order) => order,
                Err(err) => return Err(self.unwind_charge(&order, &paid, err.into()).await),
            },
            Err(err) if self.config.simulate_payment_on_failure => {
                warn!(error = %err, "payment failed, recording simulated success");
                let reference = format!("SIM-{}", Utc::now().timestamp_millis());
                self.orders
                    .record_payment(
                        &order_number,
                        &reference,
                        true,
                        &format!("Payment simulated (demo mode): {err}"),
                    )
                    .await?
            }
            Err(err) => return Err(self.payment_failed(&order, err).await),
        };
        self.announce(topics::ORDER_PAID, &order, "Payment successful")
            .await;

        if let Err(err) = self.inventory.confirm(&order_number).await {
            error!(error = %err, "reservation confirmation failed");
        }

        info!(step = STEP_DELIVERY, "saga step started");
        let order = self.request_delivery(order).await;

        self.notify(Notification::email(
            NotificationKind::OrderConfirmed,
            &owner,
            &order_number,
            format!("Order {order_number} confirmed. Total: {}", order.total()),
        ))
        .await;

        info!(status = %order.status(), "order placed");
        Ok(order)
    }

    /// Cancels an order on behalf of its owner, refunding a real payment.
    #[tracing::instrument(skip(self), fields(order_number = %order_number, owner = %owner))]
    pub async fn cancel_order(
        &self,
        owner: &CustomerId,
        order_number: &OrderNumber,
        reason: Option<&str>,
    ) -> Result<CancelResult> {
        let order = self.orders.cancel(order_number, owner, reason).await?;
        let note = order
            .history()
            .last()
            .map(|entry| entry.note.clone())
            .unwrap_or_default();
        metrics::counter!("orders_cancelled_total").increment(1);
        info!(reason = %note, "order cancelled");
        self.announce(topics::ORDER_CANCELLED, &order, &note).await;

        if order.payment_status() != PaymentStatus::Paid {
            self.notify(Notification::email(
                NotificationKind::OrderCancelled,
                owner,
                order_number,
                format!("Order {order_number} has been cancelled: {note}"),
            ))
            .await;
            return Ok(CancelResult {
                order_number: order_number.clone(),
                status: order.status(),
                payment_status: order.payment_status(),
                refund_transaction_id: None,
                refund_processed: false,
            });
        }

        let refund = self
            .payment
            .refund(order_number, order.total(), &format!("Order cancelled: {note}"))
            .await
            .map_err(|err| {
                error!(error = %err, "refund for cancelled order failed");
                err.context("Refund failed")
            })?;
        let order = self
            .orders
            .record_refund(
                order_number,
                &refund.transaction_id,
                &format!("Refund issued: {}", refund.transaction_id),
            )
            .await?;

        self.notify(Notification::email(
            NotificationKind::OrderRefunded,
            owner,
            order_number,
            format!(
                "Order {order_number} has been cancelled and {} refunded",
                refund.amount
            ),
        ))
        .await;

        Ok(CancelResult {
            order_number: order_number.clone(),
            status: order.status(),
            payment_status: order.payment_status(),
            refund_transaction_id: Some(refund.transaction_id),
            refund_processed: true,
        })
    }

    /// Returns one of the owner's orders. Orders of other owners are
    /// reported as missing.
    pub async fn get_order(&self, owner: &CustomerId, order_number: &OrderNumber) -> Result<Order> {
        match self.orders.get(order_number).await? {
            Some(order) if order.is_owned_by(owner) => Ok(order),
            _ => Err(SagaError::NotFound(format!("Order not found: {order_number}"))),
        }
    }

    pub async fn list_orders(&self, owner: &CustomerId) -> Result<Vec<Order>> {
        Ok(self.orders.list_for_owner(owner).await?)
    }

    /// Prices the requested items from the catalog.
    async fn price_items(&self, items: &[OrderItem]) -> Result<Vec<OrderLine>> {
        if items.is_empty() {
            return Err(SagaError::Validation(
                "Order must contain at least one item".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            if item.quantity == 0 {
                return Err(SagaError::Validation(format!(
                    "Invalid quantity for product {} (must be greater than 0)",
                    item.product_id
                )));
            }
            let product = self
                .catalog
                .product(&item.product_id)
                .await
                .ok_or_else(|| {
                    SagaError::Validation(format!("Product not found: {}", item.product_id))
                })?;
            if !product.active {
                return Err(SagaError::Validation(format!(
                    "Product is not available: {}",
                    product.id
                )));
            }
            lines.push(OrderLine::new(
                product.id,
                product.name,
                item.quantity,
                product.unit_price,
            ));
        }
        Ok(lines)
    }

    async fn place(&self, request: &CreateOrderRequest, lines: Vec<OrderLine>) -> Result<Order> {
        let billing = request
            .billing_address
            .clone()
            .unwrap_or_else(|| request.shipping_address.clone());

        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let cmd = PlaceOrder::new(
                OrderNumber::generate(),
                request.owner_id.clone(),
                lines.clone(),
                request.shipping_address.clone(),
                request.payment_method.clone(),
            )
            .with_billing_address(billing.clone());

            match self.orders.place_order(cmd).await {
                Err(DomainError::Order(OrderError::AlreadyPlaced)) => continue,
                result => return Ok(result?),
            }
        }
        Err(SagaError::Internal(
            "could not allocate an unused order number".to_string(),
        ))
    }

    async fn stock_failed(&self, order: &Order, err: SagaError) -> SagaError {
        metrics::counter!("orders_failed_total", "reason" => "insufficient_stock").increment(1);
        warn!(error = %err, "order stopped on stock");
        if let (Some(owner), Some(order_number)) = (order.owner_id(), order.order_number()) {
            self.notify(Notification::email(
                NotificationKind::InsufficientStock,
                owner,
                order_number,
                format!("Order {order_number} could not be fulfilled: {err}"),
            ))
            .await;
        }
        err
    }

    /// Releases the reservations and marks the order failed.
    async fn payment_failed(&self, order: &Order, err: SagaError) -> SagaError {
        metrics::counter!("orders_failed_total", "reason" => "payment").increment(1);
        warn!(error = %err, "payment failed, compensating");

        let (Some(owner), Some(order_number)) = (order.owner_id(), order.order_number()) else {
            return err.context("Payment failed");
        };
        self.release_stock(order_number).await;
        if let Err(record_err) = self
            .orders
            .record_payment_failure(order_number, &err.to_string())
            .await
        {
            error!(error = %record_err, "could not record payment failure");
        }
        self.notify(Notification::email(
            NotificationKind::PaymentFailed,
            owner,
            order_number,
            format!("Payment for order {order_number} failed: {err}"),
        ))
        .await;
        err.context("Payment failed")
    }

    /// Returns a charge the order could not record, and its stock.
    async fn unwind_charge(&self, order: &Order, paid: &PaymentResult, err: SagaError) -> SagaError {
        error!(
            transaction_id = %paid.transaction_id,
            error = %err,
            "payment taken but not recorded, refunding"
        );
        let Some(order_number) = order.order_number() else {
            return err;
        };
        self.release_stock(order_number).await;
        if let Err(refund_err) = self
            .payment
            .refund(order_number, paid.amount, &format!("Payment not recorded: {err}"))
            .await
        {
            error!(error = %refund_err, "refund of unrecorded payment failed");
            return refund_err.context("Refund failed");
        }
        err
    }

    async fn release_stock(&self, order_number: &OrderNumber) {
        if let Err(err) = self.inventory.release(order_number).await {
            error!(%order_number, error = %err, "reservation release failed");
        }
    }

    /// Creates the delivery and binds it to the order; failures leave the
    /// order paid.
    async fn request_delivery(&self, order: Order) -> Order {
        let (Some(owner), Some(order_number)) = (order.owner_id(), order.order_number()) else {
            return order;
        };
        let request = ShipmentRequest {
            order_number: order_number.clone(),
            owner_id: owner.clone(),
            shipping_address: order.shipping_address().clone(),
        };

        let shipment = match self.shipping.create_delivery(request).await {
            Ok(shipment) => shipment,
            Err(err) => {
                warn!(error = %err, "delivery creation failed, order stays paid");
                return order;
            }
        };
        match self
            .orders
            .record_delivery(
                order_number,
                &shipment.delivery_id,
                Some(&shipment.tracking_number),
            )
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                warn!(delivery_id = %shipment.delivery_id, error = %err, "could not bind delivery");
                order
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifier.send(notification).await {
            warn!(error = %err, "notification not sent");
        }
    }

    async fn announce(&self, routing_key: &str, order: &Order, note: &str) {
        let (Some(owner), Some(order_number)) = (order.owner_id(), order.order_number()) else {
            return;
        };
        let payload = OrderMessage {
            order_number: order_number.clone(),
            owner_id: owner.clone(),
            status: order.status().as_str().to_string(),
            total: order.total(),
            note: note.to_string(),
            timestamp: Utc::now(),
        };
        let published = match Message::new(routing_key, &payload) {
            Ok(message) => self.publisher.publish(message).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            warn!(routing_key, error = %err, "order event not published");
        }
    }
}

fn order_number_of(order: &Order) -> Result<OrderNumber> {
    order
        .order_number()
        .cloned()
        .ok_or_else(|| SagaError::Internal("placed order has no number".to_string()))
}
