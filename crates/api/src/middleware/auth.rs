//! Authentication middleware for protected routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use referra_shared::types::{AdminId, PartnerId};
use referra_shared::{AppError, Claims, JwtError, SCHEDULER_ROLE};

use crate::AppState;
use crate::error::{ApiResult, app_error_response};

/// Extracts the bearer token from the Authorization header.
fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
}

/// Authentication middleware that validates JWT tokens.
///
/// Valid claims are stored in the request extensions for the extractors
/// below.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = auth_header.and_then(extract_bearer_token) else {
        return app_error_response(&AppError::Unauthorized(
            "Authorization header with Bearer token is required".to_string(),
        ));
    };

    match state.jwt_service.validate_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(JwtError::Expired) => {
            app_error_response(&AppError::Unauthorized("Token has expired".to_string()))
        }
        Err(e) => {
            debug!(error = %e, "rejected bearer token");
            app_error_response(&AppError::Unauthorized(
                "Invalid or malformed token".to_string(),
            ))
        }
    }
}

/// Extractor for any authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// Returns the caller's role.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.0.role
    }

    /// Fails with 403 unless the caller may see `partner_id`.
    pub fn require_partner_access(&self, partner_id: PartnerId) -> ApiResult<()> {
        if self.0.can_access_partner(partner_id.into_inner()) {
            Ok(())
        } else {
            Err(app_error_response(&AppError::Forbidden(
                "You cannot access this partner".to_string(),
            )))
        }
    }

    /// Fails with 403 unless the caller is an admin or the scheduler.
    pub fn require_sweep_access(&self) -> ApiResult<()> {
        if self.0.is_admin() || self.0.role == SCHEDULER_ROLE {
            Ok(())
        } else {
            Err(app_error_response(&AppError::Forbidden(
                "Only admins and the scheduler can run the sweep".to_string(),
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                app_error_response(&AppError::Unauthorized(
                    "Authentication required".to_string(),
                ))
            })
    }
}

/// Extractor for program administrators. Rejects other roles with 403.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AdminId);

impl AdminUser {
    /// The admin's ID.
    #[must_use]
    pub const fn id(&self) -> AdminId {
        self.0
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.is_admin() {
            Ok(Self(AdminId::from_uuid(claims.user_id())))
        } else {
            Err(app_error_response(&AppError::Forbidden(
                "Admin role required".to_string(),
            )))
        }
    }
}
