//! Order command payloads.

use common::{Address, CustomerId, Money, OrderNumber};

use super::{OrderLine, OrderStatus};

/// Command to record a newly placed order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_number: OrderNumber,
    pub owner_id: CustomerId,
    pub lines: Vec<OrderLine>,
    /// Total the caller computed; must equal the sum of line totals.
    pub total: Money,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: String,
}

impl PlaceOrder {
    /// Builds the command, computing the total from the lines.
    pub fn new(
        order_number: OrderNumber,
        owner_id: CustomerId,
        lines: Vec<OrderLine>,
        shipping_address: Address,
        payment_method: impl Into<String>,
    ) -> Self {
        let total = lines.iter().map(OrderLine::line_total).sum();
        Self {
            order_number,
            owner_id,
            lines,
            total,
            billing_address: shipping_address.clone(),
            shipping_address,
            payment_method: payment_method.into(),
        }
    }

    pub fn with_billing_address(mut self, billing_address: Address) -> Self {
        self.billing_address = billing_address;
        self
    }
}

/// A delivery status change to fold into an order.
#[derive(Debug, Clone)]
pub struct DeliveryUpdate {
    pub status: OrderStatus,
    pub delivery_id: Option<String>,
    pub note: String,
}
