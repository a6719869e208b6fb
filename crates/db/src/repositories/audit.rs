//! Audit trail persistence.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use referra_core::audit::{AuditEntityType, NewAuditRecord};
use referra_core::error::EngineError;
use referra_shared::types::AuditLogId;

use crate::convert::stamp;
use crate::entities::audit_logs;

/// Writes one audit record on the caller's transaction.
pub(crate) async fn record<C: ConnectionTrait>(
    conn: &C,
    record: NewAuditRecord,
) -> Result<audit_logs::Model, EngineError> {
    audit_logs::ActiveModel {
        id: Set(AuditLogId::new().into_inner()),
        entity_type: Set(record.entity_type.as_str().to_string()),
        entity_id: Set(record.entity_id),
        action: Set(record.action.as_str().to_string()),
        performed_by: Set(record.performed_by.to_string()),
        metadata: Set(record.metadata),
        created_at: Set(stamp(Utc::now())),
    }
    .insert(conn)
    .await
    .map_err(EngineError::persistence)
}

/// Read side of the audit trail.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    db: DatabaseConnection,
}

impl AuditRepository {
    /// Creates a new audit repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Every record about one entity, oldest first.
    pub async fn trail(
        &self,
        entity_type: AuditEntityType,
        entity_id: Uuid,
    ) -> Result<Vec<audit_logs::Model>, EngineError> {
        audit_logs::Entity::find()
            .filter(audit_logs::Column::EntityType.eq(entity_type.as_str()))
            .filter(audit_logs::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_logs::Column::CreatedAt)
            .order_by_asc(audit_logs::Column::Id)
            .all(&self.db)
            .await
            .map_err(EngineError::persistence)
    }
}
