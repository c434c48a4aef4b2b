//! Ledger balance lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{CustomerId, Money};
use saga::SagaError;
use serde::Serialize;

use super::owner_from_headers;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub owner_id: CustomerId,
    pub balance: Money,
    pub currency: String,
}

/// GET /accounts/{owner}/balance: customers may only read their own.
#[tracing::instrument(skip(state, headers))]
pub async fn balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(owner): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let requester = owner_from_headers(&headers)?;
    let owner = CustomerId::new(owner);
    if requester != owner {
        return Err(SagaError::Forbidden(format!("Cannot read the balance of {owner}")).into());
    }

    let account = state.ledger.balance(&owner).await?;
    Ok(Json(BalanceResponse {
        account_id: account.id,
        owner_id: owner,
        balance: account.balance,
        currency: account.currency,
    }))
}
