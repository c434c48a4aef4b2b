//! Stock lookup per product.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use inventory::StockLevel;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub available: u32,
    pub reserved: u32,
    pub total: u32,
    pub warehouses: Vec<StockLevel>,
}

/// GET /inventory/{product_id}: stock summed over warehouses, with the
/// per-warehouse breakdown.
#[tracing::instrument(skip(state))]
pub async fn levels(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = ProductId::new(product_id);
    let warehouses = state.inventory.levels(&product_id).await;
    if warehouses.is_empty() {
        return Err(ApiError::NotFound(format!("No stock record for {product_id}")));
    }

    Ok(Json(StockResponse {
        available: warehouses.iter().map(|l| l.available).sum(),
        reserved: warehouses.iter().map(|l| l.reserved).sum(),
        total: warehouses.iter().map(|l| l.total).sum(),
        product_id,
        warehouses,
    }))
}
