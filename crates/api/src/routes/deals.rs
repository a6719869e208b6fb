//! Deal lifecycle routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;

use referra_core::audit::Actor;
use referra_shared::types::DealId;

use crate::AppState;
use crate::error::{ApiResult, engine_error_response};
use crate::middleware::{AdminUser, AuthUser};

/// Creates the deal routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/deals/{deal_id}", get(get_deal))
        .route("/deals/{deal_id}/review", post(start_review))
        .route("/deals/{deal_id}/approve", post(approve_deal))
        .route("/deals/{deal_id}/close", post(close_deal))
        .route("/deals/{deal_id}/reject", post(reject_deal))
        .route("/deals/{deal_id}/payment-received", post(payment_received))
        .route("/deals/{deal_id}/correction", post(correct_commission))
        .route("/deals/{deal_id}/reversal", post(reverse_commission))
}

// ============================================================================
// Request Types
// ============================================================================

/// Request body for approving a deal. Both fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    /// Final deal value; defaults to the estimate.
    #[serde(default)]
    pub final_value: Option<Decimal>,
    /// Commission rate; defaults to the registered rate.
    #[serde(default)]
    pub commission_rate: Option<Decimal>,
}

/// Request body carrying a mandatory reason.
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    /// Why the change is made.
    pub reason: String,
}

/// Request body for a commission correction.
#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    /// Corrected commission amount.
    pub amount: Decimal,
    /// Why the amount changes.
    pub reason: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/deals/{deal_id}`
async fn get_deal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(deal_id): Path<DealId>,
) -> ApiResult<impl IntoResponse> {
    let deal = state
        .deals()
        .find(deal_id)
        .await
        .map_err(engine_error_response)?;
    auth.require_partner_access(deal.partner_id)?;
    Ok(Json(deal))
}

/// POST `/deals/{deal_id}/review`
async fn start_review(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(deal_id): Path<DealId>,
) -> ApiResult<impl IntoResponse> {
    let deal = state
        .deals()
        .start_review(deal_id, Actor::Admin(admin.id()))
        .await
        .map_err(engine_error_response)?;
    Ok(Json(deal))
}

/// POST `/deals/{deal_id}/approve` - Approve and freeze the commission.
async fn approve_deal(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(deal_id): Path<DealId>,
    payload: Option<Json<ApproveRequest>>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload.unwrap_or_default();
    let deal = state
        .deals()
        .approve(
            deal_id,
            payload.final_value,
            payload.commission_rate,
            Actor::Admin(admin.id()),
        )
        .await
        .map_err(engine_error_response)?;
    Ok(Json(deal))
}

/// POST `/deals/{deal_id}/close` - Close the deal and earn its commission.
///
/// Closing a closed deal returns it unchanged with `already_closed: true`.
async fn close_deal(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(deal_id): Path<DealId>,
) -> ApiResult<impl IntoResponse> {
    let closed = state
        .deals()
        .close(deal_id, Actor::Admin(admin.id()))
        .await
        .map_err(engine_error_response)?;
    Ok(Json(closed))
}

/// POST `/deals/{deal_id}/reject`
async fn reject_deal(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(deal_id): Path<DealId>,
    Json(payload): Json<ReasonRequest>,
) -> ApiResult<impl IntoResponse> {
    let deal = state
        .deals()
        .reject(deal_id, &payload.reason, Actor::Admin(admin.id()))
        .await
        .map_err(engine_error_response)?;
    Ok(Json(deal))
}

/// POST `/deals/{deal_id}/payment-received`
async fn payment_received(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(deal_id): Path<DealId>,
) -> ApiResult<impl IntoResponse> {
    let deal = state
        .deals()
        .payment_received(deal_id, Actor::Admin(admin.id()))
        .await
        .map_err(engine_error_response)?;
    Ok(Json(deal))
}

/// POST `/deals/{deal_id}/correction`
async fn correct_commission(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(deal_id): Path<DealId>,
    Json(payload): Json<CorrectionRequest>,
) -> ApiResult<impl IntoResponse> {
    let corrected = state
        .deals()
        .correct_commission(
            deal_id,
            payload.amount,
            &payload.reason,
            Actor::Admin(admin.id()),
        )
        .await
        .map_err(engine_error_response)?;
    Ok(Json(corrected))
}

/// POST `/deals/{deal_id}/reversal` - Chargeback.
async fn reverse_commission(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(deal_id): Path<DealId>,
    Json(payload): Json<ReasonRequest>,
) -> ApiResult<impl IntoResponse> {
    let reversed = state
        .deals()
        .reverse_commission(deal_id, &payload.reason, Actor::Admin(admin.id()))
        .await
        .map_err(engine_error_response)?;
    Ok(Json(reversed))
}
