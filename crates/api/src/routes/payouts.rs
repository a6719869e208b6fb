//! Payout batch routes. All of them are admin-only.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use referra_core::audit::Actor;
use referra_core::deal::DealRecord;
use referra_core::payout::{PayoutBatchRecord, PayoutMonth};
use referra_shared::types::PayoutBatchId;

use crate::AppState;
use crate::error::{ApiResult, engine_error_response};
use crate::middleware::AdminUser;

/// Creates the payout routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payouts", post(generate_batch))
        .route("/payouts/{batch_id}", get(get_batch))
        .route("/payouts/{batch_id}/complete", post(complete_batch))
}

/// Request body for generating a batch.
#[derive(Debug, Deserialize)]
pub struct GenerateBatchRequest {
    /// Month the batch pays out, `YYYY-MM`.
    pub payout_month: PayoutMonth,
    /// Planned transfer date.
    pub payout_date: NaiveDate,
}

/// Request body for completing a batch.
#[derive(Debug, Deserialize)]
pub struct CompleteBatchRequest {
    /// Bank or processor reference of the transfer.
    pub transaction_reference: String,
    /// The admin's password, re-verified before money is marked paid.
    pub password: String,
}

/// A batch with the deals it pays.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// Batch record.
    #[serde(flatten)]
    pub batch: PayoutBatchRecord,
    /// Deals assigned to the batch.
    pub deals: Vec<DealRecord>,
}

/// POST `/payouts` - Generate a batch from approved balances.
async fn generate_batch(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<GenerateBatchRequest>,
) -> ApiResult<impl IntoResponse> {
    let generated = state
        .payouts()
        .generate(
            payload.payout_month,
            payload.payout_date,
            state.policy.payout_threshold,
            state.risk.as_ref(),
            Actor::Admin(admin.id()),
        )
        .await
        .map_err(engine_error_response)?;
    Ok((StatusCode::CREATED, Json(generated)))
}

/// GET `/payouts/{batch_id}`
async fn get_batch(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(batch_id): Path<PayoutBatchId>,
) -> ApiResult<impl IntoResponse> {
    let payouts = state.payouts();
    let batch = payouts.find(batch_id).await.map_err(engine_error_response)?;
    let deals = payouts
        .deals_in(batch_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(BatchResponse { batch, deals }))
}

/// POST `/payouts/{batch_id}/complete` - Mark the batch paid.
async fn complete_batch(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(batch_id): Path<PayoutBatchId>,
    Json(payload): Json<CompleteBatchRequest>,
) -> ApiResult<impl IntoResponse> {
    let completed = state
        .payouts()
        .complete(
            batch_id,
            &payload.transaction_reference,
            admin.id(),
            &payload.password,
            state.password_gate.as_ref(),
        )
        .await
        .map_err(engine_error_response)?;
    Ok(Json(completed))
}
