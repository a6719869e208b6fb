//! Partner routes: registration, balances, ledger, adjustments, academy bonus
//! and the partner's deals.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use referra_core::academy::AcademyOutcome;
use referra_core::audit::Actor;
use referra_core::deal::NewDeal;
use referra_core::partner::NewPartner;
use referra_shared::types::{AdminId, DealId, PageRequest, PartnerId};

use crate::AppState;
use crate::error::{ApiResult, engine_error_response};
use crate::middleware::{AdminUser, AuthUser};

/// Creates the partner routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/partners", post(create_partner))
        .route("/partners/{partner_id}", get(get_partner))
        .route("/partners/{partner_id}/ledger", get(list_ledger))
        .route("/partners/{partner_id}/adjustments", post(create_adjustment))
        .route("/partners/{partner_id}/academy-bonus", post(award_academy_bonus))
        .route(
            "/partners/{partner_id}/deals",
            get(list_deals).post(register_deal),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a manual adjustment.
#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    /// Signed amount; negative debits the partner.
    pub amount: Decimal,
    /// Why the adjustment was made.
    pub reason: String,
}

/// Result of an academy bonus request.
#[derive(Debug, Serialize)]
pub struct AcademyBonusResponse {
    /// False when the partner had already received the bonus.
    pub awarded: bool,
    /// Synthetic deal carrying the bonus, when awarded now.
    pub deal_id: Option<DealId>,
    /// Bonus amount, when awarded now.
    pub amount: Option<Decimal>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/partners` - Register a partner.
async fn create_partner(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<NewPartner>,
) -> ApiResult<impl IntoResponse> {
    let partner = state
        .partners()
        .create(payload, Actor::Admin(admin.id()))
        .await
        .map_err(engine_error_response)?;
    Ok((StatusCode::CREATED, Json(partner)))
}

/// GET `/partners/{partner_id}` - Partner with derived balances.
async fn get_partner(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(partner_id): Path<PartnerId>,
) -> ApiResult<impl IntoResponse> {
    auth.require_partner_access(partner_id)?;
    let summary = state
        .partners()
        .summary(partner_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(summary))
}

/// GET `/partners/{partner_id}/ledger` - One page of ledger entries.
async fn list_ledger(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(partner_id): Path<PartnerId>,
    Query(page): Query<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    auth.require_partner_access(partner_id)?;
    // Unknown partners are 404 rather than an empty page.
    state
        .partners()
        .find(partner_id)
        .await
        .map_err(engine_error_response)?;
    let entries = state
        .ledger()
        .entries_page(partner_id, &page)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(entries))
}

/// POST `/partners/{partner_id}/adjustments` - Append a manual adjustment.
async fn create_adjustment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(partner_id): Path<PartnerId>,
    Json(payload): Json<AdjustmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let entry = state
        .partners()
        .adjust(partner_id, payload.amount, &payload.reason, admin.id())
        .await
        .map_err(engine_error_response)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST `/partners/{partner_id}/academy-bonus` - Award the completion bonus.
///
/// Repeated calls succeed with `awarded: false`.
async fn award_academy_bonus(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(partner_id): Path<PartnerId>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state
        .academy()
        .award(
            partner_id,
            state.policy.academy_bonus_amount,
            Actor::Admin(admin.id()),
        )
        .await
        .map_err(engine_error_response)?;

    let response = match outcome {
        AcademyOutcome::Awarded(award) => (
            StatusCode::CREATED,
            Json(AcademyBonusResponse {
                awarded: true,
                deal_id: Some(award.deal_id),
                amount: Some(award.amount),
            }),
        ),
        AcademyOutcome::AlreadyAwarded => (
            StatusCode::OK,
            Json(AcademyBonusResponse {
                awarded: false,
                deal_id: None,
                amount: None,
            }),
        ),
    };
    Ok(response)
}

/// GET `/partners/{partner_id}/deals` - Deals of a partner.
async fn list_deals(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(partner_id): Path<PartnerId>,
) -> ApiResult<impl IntoResponse> {
    auth.require_partner_access(partner_id)?;
    let deals = state
        .deals()
        .list_for_partner(partner_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(deals))
}

/// POST `/partners/{partner_id}/deals` - Register a deal.
///
/// Open to the partner itself through the portal.
async fn register_deal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(partner_id): Path<PartnerId>,
    Json(payload): Json<NewDeal>,
) -> ApiResult<impl IntoResponse> {
    auth.require_partner_access(partner_id)?;
    let actor = if auth.0.is_admin() {
        Actor::Admin(AdminId::from_uuid(auth.0.user_id()))
    } else {
        Actor::System
    };
    let deal = state
        .deals()
        .register(partner_id, payload, actor)
        .await
        .map_err(engine_error_response)?;
    Ok((StatusCode::CREATED, Json(deal)))
}
