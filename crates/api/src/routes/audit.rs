//! Audit trail routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use referra_core::audit::AuditEntityType;

use crate::AppState;
use crate::error::{ApiResult, engine_error_response};
use crate::middleware::AdminUser;

/// Creates the audit routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/audit/{entity_type}/{entity_id}", get(get_trail))
}

/// GET `/audit/{entity_type}/{entity_id}` - Every record about one entity.
async fn get_trail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((entity_type, entity_id)): Path<(AuditEntityType, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let trail = state
        .audit()
        .trail(entity_type, entity_id)
        .await
        .map_err(engine_error_response)?;
    Ok(Json(trail))
}
