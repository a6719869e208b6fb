//! Tier governance routes. All of them are admin-only.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;

use referra_core::tier::Tier;
use referra_shared::types::PartnerId;

use crate::AppState;
use crate::error::{ApiResult, engine_error_response};
use crate::middleware::AdminUser;

/// Creates the tier routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/partners/{partner_id}/tier", post(change_tier))
        .route("/partners/{partner_id}/tier/lock", post(lock_tier))
        .route("/partners/{partner_id}/tier/unlock", post(unlock_tier))
        .route("/partners/{partner_id}/tier/override", post(set_override))
}

/// Request body for a manual tier change.
#[derive(Debug, Deserialize)]
pub struct ChangeTierRequest {
    /// Target tier.
    pub tier: Tier,
    /// Why the tier changes.
    pub reason: String,
}

/// Request body for lock and unlock.
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    /// Why the flag changes.
    pub reason: String,
}

/// Request body for the override flag.
#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    /// New value of the flag.
    pub enabled: bool,
    /// Why the flag changes.
    pub reason: String,
}

/// POST `/partners/{partner_id}/tier` - Change the tier by hand.
async fn change_tier(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(partner_id): Path<PartnerId>,
    Json(payload): Json<ChangeTierRequest>,
) -> ApiResult<impl IntoResponse> {
    let change = state
        .tiers()
        .change_tier(partner_id, payload.tier, &payload.reason, admin.id())
        .await
        .map_err(engine_error_response)?;
    Ok(Json(change))
}

/// POST `/partners/{partner_id}/tier/lock`
async fn lock_tier(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(partner_id): Path<PartnerId>,
    Json(payload): Json<ReasonRequest>,
) -> ApiResult<impl IntoResponse> {
    let change = state
        .tiers()
        .lock(partner_id, &payload.reason, admin.id())
        .await
        .map_err(engine_error_response)?;
    Ok(Json(change))
}

/// POST `/partners/{partner_id}/tier/unlock`
async fn unlock_tier(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(partner_id): Path<PartnerId>,
    Json(payload): Json<ReasonRequest>,
) -> ApiResult<impl IntoResponse> {
    let change = state
        .tiers()
        .unlock(partner_id, &payload.reason, admin.id())
        .await
        .map_err(engine_error_response)?;
    Ok(Json(change))
}

/// POST `/partners/{partner_id}/tier/override`
async fn set_override(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(partner_id): Path<PartnerId>,
    Json(payload): Json<OverrideRequest>,
) -> ApiResult<impl IntoResponse> {
    let change = state
        .tiers()
        .set_override(partner_id, payload.enabled, &payload.reason, admin.id())
        .await
        .map_err(engine_error_response)?;
    Ok(Json(change))
}
