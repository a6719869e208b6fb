//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for partners, deals, commissions, payouts and the audit trail
//! - JWT authentication middleware and role extractors
//! - Mapping of engine errors to JSON responses

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use referra_core::CommissionPolicy;
use referra_core::collaborators::{NoRiskFlags, Notifier, PasswordGate, RiskFlagHook};
use referra_db::{
    AcademyRepository, AuditRepository, DbPasswordGate, DealRepository, LedgerRepository,
    PartnerRepository, PayoutRepository, SweepRepository, TierRepository, TracingNotifier,
};
use referra_shared::JwtService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DatabaseConnection,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Program-wide commission policy.
    pub policy: Arc<CommissionPolicy>,
    /// Receives partner notifications after commit.
    pub notifier: Arc<dyn Notifier>,
    /// Decides which partners are held out of payouts.
    pub risk: Arc<dyn RiskFlagHook>,
    /// Re-verifies admin passwords before payout completion.
    pub password_gate: Arc<dyn PasswordGate>,
}

impl AppState {
    /// State with the default collaborators: tracing notifications, no risk
    /// flags and passwords checked against `admin_users`.
    #[must_use]
    pub fn new(db: DatabaseConnection, jwt_service: JwtService, policy: CommissionPolicy) -> Self {
        Self {
            password_gate: Arc::new(DbPasswordGate::new(db.clone())),
            db,
            jwt_service: Arc::new(jwt_service),
            policy: Arc::new(policy),
            notifier: Arc::new(TracingNotifier),
            risk: Arc::new(NoRiskFlags),
        }
    }

    /// Replaces the notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the risk-flag hook.
    #[must_use]
    pub fn with_risk_hook(mut self, risk: Arc<dyn RiskFlagHook>) -> Self {
        self.risk = risk;
        self
    }

    pub(crate) fn partners(&self) -> PartnerRepository {
        PartnerRepository::new(self.db.clone())
    }

    pub(crate) fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.db.clone())
    }

    pub(crate) fn deals(&self) -> DealRepository {
        DealRepository::new(
            self.db.clone(),
            Arc::clone(&self.notifier),
            self.policy.tier_thresholds,
        )
    }

    pub(crate) fn tiers(&self) -> TierRepository {
        TierRepository::new(self.db.clone(), Arc::clone(&self.notifier))
    }

    pub(crate) fn academy(&self) -> AcademyRepository {
        AcademyRepository::new(self.db.clone(), Arc::clone(&self.notifier))
    }

    pub(crate) fn sweep(&self) -> SweepRepository {
        SweepRepository::new(self.db.clone())
    }

    pub(crate) fn payouts(&self) -> PayoutRepository {
        PayoutRepository::new(self.db.clone(), Arc::clone(&self.notifier))
    }

    pub(crate) fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.db.clone())
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
