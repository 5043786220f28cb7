// libs/session-series-cell/src/services/notification.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{NotificationError, SessionStatus};

/// Side-effect hooks fired after schedule changes have been committed.
#[async_trait]
pub trait NotificationTrigger: Send + Sync {
    async fn on_series_created(&self, session_ids: &[Uuid], clinic_id: Uuid) -> Result<(), NotificationError>;

    async fn on_rescheduled(
        &self,
        session_id: Uuid,
        clinic_id: Uuid,
        old_time: DateTime<Utc>,
        new_time: DateTime<Utc>,
    ) -> Result<(), NotificationError>;

    async fn on_cancelled(&self, session_id: Uuid, clinic_id: Uuid) -> Result<(), NotificationError>;
}

/// A start-time change made by a reschedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionMove {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub old_time: DateTime<Utc>,
    pub new_time: DateTime<Utc>,
}

impl SessionMove {
    /// Cancelled sessions still move with their series but are never announced.
    pub fn should_notify(&self) -> bool {
        self.status != SessionStatus::Cancelled
    }
}

/// Runs notification hooks on detached tasks. Failures are logged and
/// dropped; callers never wait for or observe them.
#[derive(Clone)]
pub struct NotificationDispatcher {
    trigger: Arc<dyn NotificationTrigger>,
}

impl NotificationDispatcher {
    pub fn new(trigger: Arc<dyn NotificationTrigger>) -> Self {
        Self { trigger }
    }

    pub fn series_created(&self, session_ids: Vec<Uuid>, clinic_id: Uuid) {
        let trigger = Arc::clone(&self.trigger);
        tokio::spawn(async move {
            if let Err(e) = trigger.on_series_created(&session_ids, clinic_id).await {
                warn!("Series-created notification failed for clinic {}: {}", clinic_id, e);
            }
        });
    }

    pub fn rescheduled(&self, moves: Vec<SessionMove>, clinic_id: Uuid) {
        let trigger = Arc::clone(&self.trigger);
        tokio::spawn(async move {
            let results = join_all(moves.iter().map(|m| {
                trigger.on_rescheduled(m.session_id, clinic_id, m.old_time, m.new_time)
            }))
            .await;

            for (m, result) in moves.iter().zip(results) {
                if let Err(e) = result {
                    warn!("Reschedule notification failed for session {}: {}", m.session_id, e);
                }
            }
        });
    }

    pub fn cancelled(&self, session_ids: Vec<Uuid>, clinic_id: Uuid) {
        let trigger = Arc::clone(&self.trigger);
        tokio::spawn(async move {
            let results = join_all(session_ids.iter().map(|id| trigger.on_cancelled(*id, clinic_id))).await;

            for (id, result) in session_ids.iter().zip(results) {
                if let Err(e) = result {
                    warn!("Cancellation notification failed for session {}: {}", id, e);
                }
            }
        });
    }
}

/// Default hook: logs every event and keeps the pending reminder times per
/// session so a reschedule can drop and re-create them. Delivery itself is
/// left to the separate dispatch job.
pub struct LoggingNotificationTrigger {
    lead_minutes: Vec<i64>,
    reminders: Mutex<HashMap<Uuid, Vec<DateTime<Utc>>>>,
}

impl LoggingNotificationTrigger {
    pub fn new(lead_minutes: Vec<i64>) -> Self {
        Self {
            lead_minutes,
            reminders: Mutex::new(HashMap::new()),
        }
    }

    pub async fn pending_reminders(&self, session_id: Uuid) -> Vec<DateTime<Utc>> {
        self.reminders
            .lock()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    fn reminder_times(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut times: Vec<DateTime<Utc>> = self.lead_minutes
            .iter()
            .filter_map(|lead| start.checked_sub_signed(Duration::minutes(*lead)))
            .filter(|at| *at > now)
            .collect();
        times.sort();
        times
    }
}

#[async_trait]
impl NotificationTrigger for LoggingNotificationTrigger {
    async fn on_series_created(&self, session_ids: &[Uuid], clinic_id: Uuid) -> Result<(), NotificationError> {
        info!("Notification: {} sessions scheduled for clinic {}", session_ids.len(), clinic_id);
        Ok(())
    }

    async fn on_rescheduled(
        &self,
        session_id: Uuid,
        clinic_id: Uuid,
        old_time: DateTime<Utc>,
        new_time: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        let now = Utc::now();
        let mut reminders = self.reminders.lock().await;

        // Entries whose reminders have all fired are finished.
        let before = reminders.len();
        reminders.retain(|_, times| times.iter().any(|at| *at > now));
        if reminders.len() < before {
            debug!("Pruned {} exhausted reminder entries", before - reminders.len());
        }

        if let Some(cancelled) = reminders.remove(&session_id) {
            debug!("Cancelled {} pending reminders for session {}", cancelled.len(), session_id);
        }

        info!("Notification: session {} (clinic {}) moved from {} to {}",
              session_id, clinic_id, old_time, new_time);

        let upcoming = self.reminder_times(new_time, now);
        if !upcoming.is_empty() {
            debug!("Re-created {} reminders for session {}", upcoming.len(), session_id);
            reminders.insert(session_id, upcoming);
        }

        Ok(())
    }

    async fn on_cancelled(&self, session_id: Uuid, clinic_id: Uuid) -> Result<(), NotificationError> {
        self.reminders.lock().await.remove(&session_id);
        info!("Notification: session {} (clinic {}) cancelled", session_id, clinic_id);
        Ok(())
    }
}
