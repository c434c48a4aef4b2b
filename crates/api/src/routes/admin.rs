//! Operator endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use saga::AbandonedEvent;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct LossProbabilityBody {
    pub probability: f64,
}

/// GET /admin/delivery/loss-probability
pub async fn loss_probability(State(state): State<Arc<AppState>>) -> Json<LossProbabilityBody> {
    Json(LossProbabilityBody {
        probability: state.deliveries.loss_probability().get(),
    })
}

/// PUT /admin/delivery/loss-probability: takes effect on the next scan.
#[tracing::instrument(skip(state))]
pub async fn set_loss_probability(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LossProbabilityBody>,
) -> Result<Json<LossProbabilityBody>, ApiError> {
    let setting = state.deliveries.loss_probability();
    let previous = setting.get();
    setting.set(body.probability)?;
    info!(previous, probability = body.probability, "loss probability updated");
    Ok(Json(body))
}

/// GET /admin/reconciler/abandoned: delivery events given up on.
pub async fn abandoned_events(State(state): State<Arc<AppState>>) -> Json<Vec<AbandonedEvent>> {
    Json(state.reconciler.abandoned().await)
}
