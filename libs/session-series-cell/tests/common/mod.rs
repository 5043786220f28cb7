#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use session_series_cell::api::{
    InMemoryDirectory, InMemorySessionStore, NotificationTrigger, SessionLifecycleService,
    SessionServices, SessionStore,
};
use session_series_cell::models::{
    CreateSeriesRequest, NotificationError, Patient, Session, SessionError, SessionFilter,
    SessionPatch, SessionUpdate, StaffMember, TenantContext,
};

// ==============================================================================
// NOTIFICATION RECORDER
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    SeriesCreated(Vec<Uuid>),
    Rescheduled { session_id: Uuid, old_time: DateTime<Utc>, new_time: DateTime<Utc> },
    Cancelled(Uuid),
}

pub struct RecordingTrigger {
    events: mpsc::UnboundedSender<NotificationEvent>,
    fail: bool,
}

#[async_trait]
impl NotificationTrigger for RecordingTrigger {
    async fn on_series_created(&self, session_ids: &[Uuid], _clinic_id: Uuid) -> Result<(), NotificationError> {
        let _ = self.events.send(NotificationEvent::SeriesCreated(session_ids.to_vec()));
        if self.fail {
            return Err(NotificationError::Dispatch("mail relay down".to_string()));
        }
        Ok(())
    }

    async fn on_rescheduled(
        &self,
        session_id: Uuid,
        _clinic_id: Uuid,
        old_time: DateTime<Utc>,
        new_time: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        let _ = self.events.send(NotificationEvent::Rescheduled { session_id, old_time, new_time });
        if self.fail {
            return Err(NotificationError::Reminder(session_id));
        }
        Ok(())
    }

    async fn on_cancelled(&self, session_id: Uuid, _clinic_id: Uuid) -> Result<(), NotificationError> {
        let _ = self.events.send(NotificationEvent::Cancelled(session_id));
        if self.fail {
            return Err(NotificationError::Dispatch("mail relay down".to_string()));
        }
        Ok(())
    }
}

// ==============================================================================
// STORE THAT REJECTS BATCH UPDATES
// ==============================================================================

/// Delegates to an in-memory store but refuses every `update_batch`.
pub struct RejectingBatchStore {
    pub inner: Arc<InMemorySessionStore>,
}

#[async_trait]
impl SessionStore for RejectingBatchStore {
    async fn create(&self, session: Session, tenant: &TenantContext) -> Result<Uuid, SessionError> {
        self.inner.create(session, tenant).await
    }

    async fn create_batch(&self, sessions: Vec<Session>, tenant: &TenantContext) -> Result<Vec<Uuid>, SessionError> {
        self.inner.create_batch(sessions, tenant).await
    }

    async fn find_by_id(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<Session>, SessionError> {
        self.inner.find_by_id(id, tenant).await
    }

    async fn find_series_by_anchor_id(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<Vec<Session>, SessionError> {
        self.inner.find_series_by_anchor_id(anchor_id, tenant).await
    }

    async fn find_by_filters(&self, filter: &SessionFilter, tenant: &TenantContext) -> Result<Vec<Session>, SessionError> {
        self.inner.find_by_filters(filter, tenant).await
    }

    async fn update(&self, id: Uuid, patch: &SessionPatch, tenant: &TenantContext) -> Result<bool, SessionError> {
        self.inner.update(id, patch, tenant).await
    }

    async fn update_batch(&self, _updates: &[SessionUpdate], _tenant: &TenantContext) -> Result<(), SessionError> {
        Err(SessionError::Persistence("connection reset".to_string()))
    }

    async fn delete_series(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<usize, SessionError> {
        self.inner.delete_series(anchor_id, tenant).await
    }
}

// ==============================================================================
// TEST FIXTURE
// ==============================================================================

pub struct TestClinic {
    pub store: Arc<InMemorySessionStore>,
    pub services: SessionServices,
    pub tenant: TenantContext,
    pub patient: Patient,
    pub therapist: StaffMember,
    pub receptionist: StaffMember,
    pub events: mpsc::UnboundedReceiver<NotificationEvent>,
}

#[derive(Default)]
pub struct TestClinicBuilder {
    allow_cancel_completed: bool,
    failing_notifications: bool,
    rejecting_batches: bool,
}

impl TestClinicBuilder {
    pub fn allow_cancel_completed(mut self) -> Self {
        self.allow_cancel_completed = true;
        self
    }

    pub fn failing_notifications(mut self) -> Self {
        self.failing_notifications = true;
        self
    }

    pub fn rejecting_batches(mut self) -> Self {
        self.rejecting_batches = true;
        self
    }

    pub fn build(self) -> TestClinic {
        let clinic_id = Uuid::new_v4();
        let patient = Patient {
            id: Uuid::new_v4(),
            clinic_id,
            first_name: Some("Ana".to_string()),
            last_name: Some("Souza".to_string()),
        };
        let therapist = StaffMember {
            id: Uuid::new_v4(),
            clinic_id,
            role: "therapist".to_string(),
            job_title: Some("Physiotherapist".to_string()),
        };
        let receptionist = StaffMember {
            id: Uuid::new_v4(),
            clinic_id,
            role: "receptionist".to_string(),
            job_title: None,
        };

        let directory = Arc::new(
            InMemoryDirectory::new()
                .with_patient(patient.clone())
                .with_staff(therapist.clone())
                .with_staff(receptionist.clone()),
        );

        let store = Arc::new(InMemorySessionStore::new());
        let session_store: Arc<dyn SessionStore> = if self.rejecting_batches {
            Arc::new(RejectingBatchStore { inner: Arc::clone(&store) })
        } else {
            store.clone()
        };

        let (tx, events) = mpsc::unbounded_channel();
        let trigger = Arc::new(RecordingTrigger { events: tx, fail: self.failing_notifications });

        let services = SessionServices::new(
            session_store,
            directory.clone(),
            directory,
            trigger,
            SessionLifecycleService::new(self.allow_cancel_completed),
        );

        TestClinic {
            store,
            services,
            tenant: TenantContext::new(clinic_id),
            patient,
            therapist,
            receptionist,
            events,
        }
    }
}

impl TestClinic {
    pub fn new() -> Self {
        TestClinicBuilder::default().build()
    }

    pub fn builder() -> TestClinicBuilder {
        TestClinicBuilder::default()
    }

    pub fn weekly_request(&self, follow_ups: i64) -> CreateSeriesRequest {
        CreateSeriesRequest {
            patient_id: Some(self.patient.id),
            therapist_id: Some(self.therapist.id),
            start_time: Some(series_start()),
            periodicity: Some("Weekly".to_string()),
            duration_minutes: Some(45),
            number_of_follow_ups: Some(follow_ups),
            notes: Some("Post-op knee rehab".to_string()),
        }
    }

    /// Creates a weekly series and returns it ordered by `series_order`.
    pub async fn seed_weekly_series(&mut self, follow_ups: i64) -> Vec<Session> {
        let created = self.services.series
            .create_series(&self.tenant, self.weekly_request(follow_ups))
            .await
            .unwrap();
        self.drain_events().await;

        self.services.series
            .get_series(&self.tenant, created.anchor_id)
            .await
            .unwrap()
    }

    /// Copies `template` into a fresh clinic sharing the same store, with new ids.
    pub async fn seed_foreign_series(&self, template: &[Session]) -> (TenantContext, Vec<Session>) {
        let tenant = TenantContext::new(Uuid::new_v4());
        let anchor_id = Uuid::new_v4();
        let copies: Vec<Session> = template
            .iter()
            .map(|s| Session {
                id: if s.series_order == 0 { anchor_id } else { Uuid::new_v4() },
                clinic_id: tenant.clinic_id,
                parent_session_id: s.parent_session_id.map(|_| anchor_id),
                ..s.clone()
            })
            .collect();

        self.store.create_batch(copies.clone(), &tenant).await.unwrap();
        (tenant, copies)
    }

    /// Waits for the next notification from the detached dispatcher.
    pub async fn next_event(&mut self) -> Option<NotificationEvent> {
        tokio::time::timeout(StdDuration::from_secs(2), self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Collects whatever notifications arrive within a short window.
    pub async fn drain_events(&mut self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(StdDuration::from_millis(100), self.events.recv()).await
        {
            events.push(event);
        }
        events
    }
}

pub fn series_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 25, 10, 0, 0).unwrap()
}
