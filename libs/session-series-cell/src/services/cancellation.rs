// libs/session-series-cell/src/services/cancellation.rs
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    SessionError, SessionPatch, SessionStatus, SessionUpdate, SeriesCancelled, TenantContext,
};
use crate::services::lifecycle::SessionLifecycleService;
use crate::services::notification::NotificationDispatcher;
use crate::services::store::SessionStore;

/// Status-only cancellation of one session or a whole series. Nothing is deleted.
pub struct CancellationService {
    store: Arc<dyn SessionStore>,
    lifecycle: SessionLifecycleService,
    notifier: NotificationDispatcher,
}

impl CancellationService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        lifecycle: SessionLifecycleService,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { store, lifecycle, notifier }
    }

    pub async fn cancel_session(&self, tenant: &TenantContext, session_id: Uuid) -> Result<(), SessionError> {
        let session = self.store
            .find_by_id(session_id, tenant)
            .await?
            .ok_or(SessionError::SessionNotFound)?;

        self.lifecycle.validate_status_transition(session.status, SessionStatus::Cancelled)?;

        let patch = SessionPatch::status(SessionStatus::Cancelled);
        if !self.store.update(session_id, &patch, tenant).await? {
            return Err(SessionError::SessionNotFound);
        }

        self.notifier.cancelled(vec![session_id], tenant.clinic_id);

        info!("Cancelled session {}", session_id);
        Ok(())
    }

    /// Cancels every member of the series that `session_id` belongs to.
    /// Members that may not move to cancelled (already cancelled, or
    /// completed under the strict policy) are left as they are.
    pub async fn cancel_series(&self, tenant: &TenantContext, session_id: Uuid) -> Result<SeriesCancelled, SessionError> {
        let session = self.store
            .find_by_id(session_id, tenant)
            .await?
            .ok_or(SessionError::SessionNotFound)?;

        let anchor_id = session.anchor_id();
        let mut series = self.store.find_series_by_anchor_id(anchor_id, tenant).await?;
        if series.is_empty() {
            series.push(session);
        }

        let updates: Vec<SessionUpdate> = series
            .iter()
            .filter(|s| self.lifecycle.can_cancel(s.status))
            .map(|s| SessionUpdate {
                id: s.id,
                patch: SessionPatch::status(SessionStatus::Cancelled),
            })
            .collect();

        debug!("Cancelling {} of {} sessions in series {}", updates.len(), series.len(), anchor_id);

        self.store.update_batch(&updates, tenant).await?;

        let cancelled: Vec<Uuid> = updates.iter().map(|u| u.id).collect();
        let cancelled_sessions = cancelled.len();
        if !cancelled.is_empty() {
            self.notifier.cancelled(cancelled, tenant.clinic_id);
        }

        info!("Cancelled {} sessions of series {}", cancelled_sessions, anchor_id);
        Ok(SeriesCancelled { cancelled_sessions })
    }
}
