//! Order endpoints, scoped to the requesting customer.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{Address, CustomerId, Money, OrderNumber};
use domain::{HistoryEntry, Order, OrderLine, OrderStatus, PaymentStatus};
use saga::{CancelResult, CreateOrderRequest, OrderItem};
use serde::{Deserialize, Serialize};

use super::owner_from_headers;
use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub items: Vec<OrderItemBody>,
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItemBody {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_number: Option<OrderNumber>,
    pub owner_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub refund_reference: Option<String>,
    pub delivery_id: Option<String>,
    pub tracking_number: Option<String>,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: String,
    pub history: Vec<HistoryEntry>,
    pub placed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number().cloned(),
            owner_id: order.owner_id().cloned(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_reference: order.payment_reference().map(String::from),
            refund_reference: order.refund_reference().map(String::from),
            delivery_id: order.delivery_id().map(String::from),
            tracking_number: order.tracking_number().map(String::from),
            lines: order.lines().to_vec(),
            total: order.total(),
            shipping_address: order.shipping_address().clone(),
            billing_address: order.billing_address().clone(),
            payment_method: order.payment_method().to_string(),
            history: order.history().to_vec(),
            placed_at: order.placed_at(),
            updated_at: order.updated_at(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order and run it through stock, payment and delivery.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let owner_id = owner_from_headers(&headers)?;
    let request = CreateOrderRequest {
        owner_id,
        items: body
            .items
            .into_iter()
            .map(|item| OrderItem::new(item.product_id, item.quantity))
            .collect(),
        shipping_address: body.shipping_address,
        billing_address: body.billing_address,
        payment_method: body.payment_method.unwrap_or_else(|| "ACCOUNT".to_string()),
    };

    let order = state.saga.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the requesting customer's orders, newest first.
#[tracing::instrument(skip(state, headers))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let owner = owner_from_headers(&headers)?;
    let mut orders = state.saga.list_orders(&owner).await?;
    orders.sort_by_key(|o| std::cmp::Reverse(o.placed_at()));
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{order_number}
#[tracing::instrument(skip(state, headers))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_number): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let owner = owner_from_headers(&headers)?;
    let order = state
        .saga
        .get_order(&owner, &OrderNumber::new(order_number))
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{order_number}/cancel: cancel, refunding a real payment.
///
/// The body is optional: `{"reason": "..."}`.
#[tracing::instrument(skip(state, headers, body))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_number): Path<String>,
    body: Bytes,
) -> Result<Json<CancelResult>, ApiError> {
    let owner = owner_from_headers(&headers)?;
    let body: CancelBody = if body.is_empty() {
        CancelBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid cancel body: {e}")))?
    };

    let result = state
        .saga
        .cancel_order(
            &owner,
            &OrderNumber::new(order_number),
            body.reason.as_deref(),
        )
        .await?;
    Ok(Json(result))
}
