// libs/session-series-cell/src/services/reschedule.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    RescheduleOutcome, Session, SessionError, SessionPatch, SessionUpdate, TenantContext,
};
use crate::services::notification::{NotificationDispatcher, SessionMove};
use crate::services::store::SessionStore;

/// Shifts `target` and every later member of `series` by the same `delta`.
///
/// Earlier members are left alone, so moving a follow-up never touches the
/// anchor or its predecessors. The shift is a fixed duration, not a
/// recomputation from periodicity, which keeps any hand-edited spacing.
pub fn plan_cascade(
    series: &[Session],
    target: &Session,
    delta: Duration,
) -> Result<Vec<SessionMove>, SessionError> {
    let mut members: Vec<&Session> = series
        .iter()
        .filter(|s| s.series_order >= target.series_order)
        .collect();

    // The store may not have returned the target (e.g. a standalone session).
    if !members.iter().any(|s| s.id == target.id) {
        members.push(target);
    }
    members.sort_by_key(|s| s.series_order);

    members
        .into_iter()
        .map(|s| {
            let new_time = s.start_time.checked_add_signed(delta).ok_or_else(|| {
                SessionError::InvalidTime(format!("Shifting session {} moves it out of range", s.id))
            })?;
            Ok(SessionMove {
                session_id: s.id,
                status: s.status,
                old_time: s.start_time,
                new_time,
            })
        })
        .collect()
}

/// Moves a session and the rest of its series forward or back in one batch.
pub struct CascadeRescheduler {
    store: Arc<dyn SessionStore>,
    notifier: NotificationDispatcher,
}

impl CascadeRescheduler {
    pub fn new(store: Arc<dyn SessionStore>, notifier: NotificationDispatcher) -> Self {
        Self { store, notifier }
    }

    pub async fn reschedule(
        &self,
        tenant: &TenantContext,
        session_id: Uuid,
        new_start_time: DateTime<Utc>,
    ) -> Result<RescheduleOutcome, SessionError> {
        let session = self.store
            .find_by_id(session_id, tenant)
            .await?
            .ok_or(SessionError::SessionNotFound)?;

        let delta = new_start_time - session.start_time;
        if delta == Duration::zero() {
            return Err(SessionError::NoOpReschedule);
        }

        let anchor_id = session.anchor_id();
        info!("Rescheduling session {} (order {}) of series {} by {} minutes",
              session_id, session.series_order, anchor_id, delta.num_minutes());

        let series = self.store.find_series_by_anchor_id(anchor_id, tenant).await?;
        let moves = plan_cascade(&series, &session, delta)?;
        debug!("Cascade covers {} of {} sessions", moves.len(), series.len());

        let updates: Vec<SessionUpdate> = moves
            .iter()
            .map(|m| SessionUpdate {
                id: m.session_id,
                patch: SessionPatch::start_time(m.new_time),
            })
            .collect();

        self.store.update_batch(&updates, tenant).await?;

        let affected_session_ids: Vec<Uuid> = moves.iter().map(|m| m.session_id).collect();
        let announced: Vec<SessionMove> = moves.into_iter().filter(SessionMove::should_notify).collect();
        if !announced.is_empty() {
            self.notifier.rescheduled(announced, tenant.clinic_id);
        }

        info!("Rescheduled {} sessions of series {}", affected_session_ids.len(), anchor_id);
        Ok(RescheduleOutcome {
            updated_sessions: affected_session_ids.len(),
            time_delta: delta.num_minutes(),
            affected_session_ids,
        })
    }
}
