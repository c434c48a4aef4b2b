//! Order service wrapping the command handler.

use common::{CustomerId, OrderNumber};
use event_store::{EventStore, StreamId};

use crate::command::CommandHandler;
use crate::error::DomainError;

use super::{DeliveryUpdate, Order, OrderEvent, PlaceOrder};

/// High-level API for reading and changing orders.
///
/// Every write goes through the command handler, so concurrent writers to
/// the same order serialize on the stream version.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    #[tracing::instrument(skip(self, cmd), fields(order_number = %cmd.order_number))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let stream = stream_of(&cmd.order_number);
        let result = self.handler.execute(&stream, |order| order.place(&cmd)).await?;
        metrics::counter!("orders_placed_total").increment(1);
        Ok(result.aggregate)
    }

    /// Marks the charge as started, fencing off cancellation until it settles.
    #[tracing::instrument(skip(self))]
    pub async fn begin_payment(&self, order_number: &OrderNumber) -> Result<Order, DomainError> {
        self.execute(order_number, |order| order.begin_payment()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_payment(
        &self,
        order_number: &OrderNumber,
        transaction_id: &str,
        simulated: bool,
        note: &str,
    ) -> Result<Order, DomainError> {
        self.execute(order_number, |order| {
            order.record_payment(transaction_id, simulated, note)
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_payment_failure(
        &self,
        order_number: &OrderNumber,
        reason: &str,
    ) -> Result<Order, DomainError> {
        self.execute(order_number, |order| order.record_payment_failure(reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_delivery(
        &self,
        order_number: &OrderNumber,
        delivery_id: &str,
        tracking_number: Option<&str>,
    ) -> Result<Order, DomainError> {
        self.execute(order_number, |order| {
            order.record_delivery(delivery_id, tracking_number)
        })
        .await
    }

    /// Applies a delivery update; returns the order and the recorded events.
    ///
    /// The guards run inside the command, against the state the events are
    /// appended to.
    #[tracing::instrument(skip(self, update), fields(status = %update.status))]
    pub async fn reconcile_delivery(
        &self,
        order_number: &OrderNumber,
        update: &DeliveryUpdate,
    ) -> Result<(Order, Vec<OrderEvent>), DomainError> {
        let stream = self.existing_stream(order_number).await?;
        let result = self
            .handler
            .execute(&stream, |order| order.reconcile_delivery(update))
            .await?;
        Ok((result.aggregate, result.events))
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        order_number: &OrderNumber,
        requested_by: &CustomerId,
        reason: Option<&str>,
    ) -> Result<Order, DomainError> {
        self.execute(order_number, |order| order.cancel(requested_by, reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_refund(
        &self,
        order_number: &OrderNumber,
        refund_transaction_id: &str,
        note: &str,
    ) -> Result<Order, DomainError> {
        self.execute(order_number, |order| {
            order.record_refund(refund_transaction_id, note)
        })
        .await
    }

    /// Loads an order, returning `None` if it doesn't exist.
    pub async fn get(&self, order_number: &OrderNumber) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(&stream_of(order_number)).await
    }

    /// Returns every order placed by `owner`, oldest first.
    pub async fn list_for_owner(&self, owner: &CustomerId) -> Result<Vec<Order>, DomainError> {
        let placed = self.handler.store().events_of_type("OrderPlaced").await?;

        let mut orders = Vec::new();
        for envelope in placed {
            let OrderEvent::OrderPlaced(data) = envelope.decode::<OrderEvent>()? else {
                continue;
            };
            if &data.owner_id != owner {
                continue;
            }
            if let Some(order) = self.handler.load_existing(&envelope.stream_id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn execute<F>(&self, order_number: &OrderNumber, command_fn: F) -> Result<Order, DomainError>
    where
        F: Fn(&Order) -> Result<Vec<OrderEvent>, super::OrderError>,
    {
        let stream = self.existing_stream(order_number).await?;
        let result = self.handler.execute(&stream, command_fn).await?;
        Ok(result.aggregate)
    }

    async fn existing_stream(&self, order_number: &OrderNumber) -> Result<StreamId, DomainError> {
        let stream = stream_of(order_number);
        match self.handler.store().stream_version(&stream).await? {
            Some(_) => Ok(stream),
            None => Err(DomainError::NotFound {
                aggregate_type: "Order",
                id: order_number.to_string(),
            }),
        }
    }
}

fn stream_of(order_number: &OrderNumber) -> StreamId {
    StreamId::new(order_number.as_str())
}
