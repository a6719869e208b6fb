//! Admin credentials and the password re-verification gate.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};

use referra_core::auth::{hash_admin_password, reauthenticate};
use referra_core::collaborators::PasswordGate;
use referra_core::error::EngineError;
use referra_shared::auth::ADMIN_ROLE;
use referra_shared::types::AdminId;

use crate::convert::stamp;
use crate::entities::admin_users;

/// Admin credential store.
#[derive(Debug, Clone)]
pub struct AdminRepository {
    db: DatabaseConnection,
}

impl AdminRepository {
    /// Creates a new admin repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores a new admin with an Argon2id password hash.
    ///
    /// # Errors
    ///
    /// * `Validation` for a short password
    /// * `StateConflict` if the email is taken
    pub async fn create(
        &self,
        email: &str,
        password: &str,
    ) -> Result<admin_users::Model, EngineError> {
        let email = email.trim().to_lowercase();
        let password_hash = hash_admin_password(password)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(EngineError::StateConflict(format!("admin {email} already exists")));
        }

        let model = admin_users::ActiveModel {
            id: Set(AdminId::new().into_inner()),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(ADMIN_ROLE.to_string()),
            created_at: Set(stamp(Utc::now())),
        }
        .insert(&self.db)
        .await
        .map_err(EngineError::persistence)?;

        info!(admin_id = %model.id, "admin created");
        Ok(model)
    }

    /// Finds an admin by email.
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<admin_users::Model>, EngineError> {
        admin_users::Entity::find()
            .filter(admin_users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.db)
            .await
            .map_err(EngineError::persistence)
    }
}

/// [`PasswordGate`] backed by the `admin_users` table.
#[derive(Debug, Clone)]
pub struct DbPasswordGate {
    db: DatabaseConnection,
}

impl DbPasswordGate {
    /// Creates a new gate.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PasswordGate for DbPasswordGate {
    async fn verify(&self, admin: AdminId, password: &str) -> Result<(), EngineError> {
        let stored = admin_users::Entity::find_by_id(admin.into_inner())
            .one(&self.db)
            .await
            .map_err(EngineError::persistence)?;
        let result = reauthenticate(password, stored.as_ref().map(|a| a.password_hash.as_str()));
        if result.is_err() {
            warn!(%admin, "password re-verification failed");
        }
        result
    }
}
