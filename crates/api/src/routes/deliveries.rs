//! Delivery lookup and carrier loss reports.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use delivery::Delivery;
use serde::Deserialize;

use super::owner_from_headers;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ReportLostBody {
    pub reason: String,
}

/// GET /deliveries/{delivery_id}: visible to the customer it ships to.
#[tracing::instrument(skip(state, headers))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(delivery_id): Path<String>,
) -> Result<Json<Delivery>, ApiError> {
    let owner = owner_from_headers(&headers)?;
    let delivery = state.deliveries.get(&delivery_id).await?;
    if delivery.owner_id != owner {
        return Err(ApiError::NotFound(format!("Delivery not found: {delivery_id}")));
    }
    Ok(Json(delivery))
}

/// POST /deliveries/{delivery_id}/lost: the carrier reports a parcel lost.
#[tracing::instrument(skip(state, body))]
pub async fn report_lost(
    State(state): State<Arc<AppState>>,
    Path(delivery_id): Path<String>,
    Json(body): Json<ReportLostBody>,
) -> Result<Json<Delivery>, ApiError> {
    let delivery = state
        .deliveries
        .report_lost(&delivery_id, body.reason.trim())
        .await?;
    Ok(Json(delivery))
}
