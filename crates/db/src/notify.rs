//! Post-commit notification delivery.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use referra_core::collaborators::{Notification, NotificationEvent, Notifier, NotifyError};
use referra_shared::types::PartnerId;

/// Notifier that writes every notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        partner_id: PartnerId,
        event: NotificationEvent,
        payload: &JsonValue,
    ) -> Result<(), NotifyError> {
        info!(%partner_id, %event, %payload, "partner notification");
        Ok(())
    }
}

/// Sends notifications for a committed change.
///
/// Failures are logged and dropped; the change stays committed.
pub async fn dispatch(notifier: &dyn Notifier, notifications: Vec<Notification>) {
    for notification in notifications {
        if let Err(e) = notifier
            .notify(notification.partner_id, notification.event, &notification.payload)
            .await
        {
            warn!(
                partner_id = %notification.partner_id,
                event = %notification.event,
                error = %e,
                "notification failed"
            );
        }
    }
}
