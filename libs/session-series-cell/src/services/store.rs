// libs/session-series-cell/src/services/store.rs
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    Session, SessionError, SessionFilter, SessionPatch, SessionUpdate, TenantContext,
};

/// Persistence contract for sessions.
///
/// Every read and write is scoped to `tenant.clinic_id`. A session belonging
/// to another clinic behaves exactly like a missing one.
///
/// `create_batch` and `update_batch` are all-or-nothing: on error the store
/// is left as it was before the call.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts one session. A nil id is replaced by a fresh UUID.
    async fn create(&self, session: Session, tenant: &TenantContext) -> Result<Uuid, SessionError>;

    /// Inserts all sessions atomically and returns their ids in input order.
    async fn create_batch(&self, sessions: Vec<Session>, tenant: &TenantContext) -> Result<Vec<Uuid>, SessionError>;

    async fn find_by_id(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<Session>, SessionError>;

    /// The anchor and all of its follow-ups, ordered by `series_order`.
    async fn find_series_by_anchor_id(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<Vec<Session>, SessionError>;

    /// Sessions matching `filter`, ordered by start time.
    async fn find_by_filters(&self, filter: &SessionFilter, tenant: &TenantContext) -> Result<Vec<Session>, SessionError>;

    /// Returns `false` when no session with `id` exists in the tenant.
    async fn update(&self, id: Uuid, patch: &SessionPatch, tenant: &TenantContext) -> Result<bool, SessionError>;

    /// Applies every update or none. An id missing from the tenant aborts the batch.
    async fn update_batch(&self, updates: &[SessionUpdate], tenant: &TenantContext) -> Result<(), SessionError>;

    /// Administrative hard delete of an anchor and its follow-ups.
    async fn delete_series(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<usize, SessionError>;
}

pub(crate) fn ensure_tenant(session: &Session, tenant: &TenantContext) -> Result<(), SessionError> {
    if session.clinic_id != tenant.clinic_id {
        warn!("Refusing to write session {} for clinic {} from clinic {}",
              session.id, session.clinic_id, tenant.clinic_id);
        return Err(SessionError::Unauthorized);
    }
    Ok(())
}

fn belongs_to_series(session: &Session, anchor_id: Uuid) -> bool {
    session.id == anchor_id || session.parent_session_id == Some(anchor_id)
}

/// Process-local store used for development and tests. A single write lock
/// covers each batch, and batches are validated before anything is mutated.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session, tenant: &TenantContext) -> Result<Uuid, SessionError> {
        let mut ids = self.create_batch(vec![session], tenant).await?;
        ids.pop().ok_or_else(|| SessionError::Persistence("Insert returned no id".to_string()))
    }

    async fn create_batch(&self, mut sessions: Vec<Session>, tenant: &TenantContext) -> Result<Vec<Uuid>, SessionError> {
        let mut guard = self.sessions.write().await;

        let mut seen = HashSet::with_capacity(sessions.len());
        for session in sessions.iter_mut() {
            ensure_tenant(session, tenant)?;
            if session.id.is_nil() {
                session.id = Uuid::new_v4();
            }
            if guard.contains_key(&session.id) || !seen.insert(session.id) {
                return Err(SessionError::Persistence(format!("Duplicate session id {}", session.id)));
            }
        }

        let ids: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
        for session in sessions {
            guard.insert(session.id, session);
        }

        debug!("Inserted {} sessions for clinic {}", ids.len(), tenant.clinic_id);
        Ok(ids)
    }

    async fn find_by_id(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<Session>, SessionError> {
        let guard = self.sessions.read().await;
        Ok(guard
            .get(&id)
            .filter(|s| s.clinic_id == tenant.clinic_id)
            .cloned())
    }

    async fn find_series_by_anchor_id(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<Vec<Session>, SessionError> {
        let guard = self.sessions.read().await;
        let mut series: Vec<Session> = guard
            .values()
            .filter(|s| s.clinic_id == tenant.clinic_id && belongs_to_series(s, anchor_id))
            .cloned()
            .collect();
        series.sort_by_key(|s| s.series_order);
        Ok(series)
    }

    async fn find_by_filters(&self, filter: &SessionFilter, tenant: &TenantContext) -> Result<Vec<Session>, SessionError> {
        let guard = self.sessions.read().await;
        let mut matches: Vec<Session> = guard
            .values()
            .filter(|s| s.clinic_id == tenant.clinic_id && filter.matches(s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.series_order.cmp(&b.series_order)));

        Ok(matches
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn update(&self, id: Uuid, patch: &SessionPatch, tenant: &TenantContext) -> Result<bool, SessionError> {
        let mut guard = self.sessions.write().await;
        match guard.get_mut(&id) {
            Some(session) if session.clinic_id == tenant.clinic_id => {
                patch.apply_to(session, Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_batch(&self, updates: &[SessionUpdate], tenant: &TenantContext) -> Result<(), SessionError> {
        let mut guard = self.sessions.write().await;
        let now = Utc::now();

        // Stage every change on copies first so a bad id leaves nothing applied.
        let mut staged = Vec::with_capacity(updates.len());
        for update in updates {
            let current = guard
                .get(&update.id)
                .filter(|s| s.clinic_id == tenant.clinic_id)
                .ok_or_else(|| SessionError::Persistence(format!(
                    "Session {} not found in clinic, batch aborted", update.id
                )))?;
            let mut next = current.clone();
            update.patch.apply_to(&mut next, now);
            staged.push(next);
        }

        for session in staged {
            guard.insert(session.id, session);
        }

        debug!("Applied batch of {} updates for clinic {}", updates.len(), tenant.clinic_id);
        Ok(())
    }

    async fn delete_series(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<usize, SessionError> {
        let mut guard = self.sessions.write().await;
        let before = guard.len();
        guard.retain(|_, s| !(s.clinic_id == tenant.clinic_id && belongs_to_series(s, anchor_id)));
        Ok(before - guard.len())
    }
}
