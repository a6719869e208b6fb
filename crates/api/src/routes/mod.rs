//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth_middleware};

pub mod audit;
pub mod commissions;
pub mod deals;
pub mod health;
pub mod partners;
pub mod payouts;
pub mod tiers;

/// Creates the API router; everything but the health check requires a token.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(partners::routes())
        .merge(tiers::routes())
        .merge(deals::routes())
        .merge(commissions::routes())
        .merge(payouts::routes())
        .merge(audit::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}
