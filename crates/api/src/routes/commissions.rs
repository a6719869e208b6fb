//! Commission approval sweep trigger.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use chrono::Utc;

use crate::AppState;
use crate::error::{ApiResult, engine_error_response};
use crate::middleware::AuthUser;

/// Creates the commission routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/commissions/sweep", post(run_sweep))
}

/// POST `/commissions/sweep` - Approve commissions past their hold period.
///
/// Called by the scheduler; safe to call repeatedly.
async fn run_sweep(State(state): State<AppState>, auth: AuthUser) -> ApiResult<impl IntoResponse> {
    auth.require_sweep_access()?;
    let report = state
        .sweep()
        .run(state.policy.hold_period, Utc::now())
        .await
        .map_err(engine_error_response)?;
    Ok(Json(report))
}
