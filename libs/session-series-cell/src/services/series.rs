// libs/session-series-cell/src/services/series.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    CreateSeriesRequest, Periodicity, Session, SessionError, SessionFilter, SessionPatch,
    SessionStatus, SeriesCreated, StaffMember, TenantContext, UpdateSessionRequest,
    DEFAULT_DURATION_MINUTES, DEFAULT_FOLLOW_UPS, MAX_FOLLOW_UPS, MIN_FOLLOW_UPS,
};
use crate::services::directory::{PatientDirectory, StaffDirectory};
use crate::services::lifecycle::SessionLifecycleService;
use crate::services::notification::NotificationDispatcher;
use crate::services::periodicity::follow_up_dates;
use crate::services::store::SessionStore;

/// A create request that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSeries {
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub periodicity: Periodicity,
    pub duration_minutes: i32,
    pub number_of_follow_ups: usize,
    pub notes: Option<String>,
}

/// Field checks for a create request, in the order they are reported.
pub fn validate_series_request(request: &CreateSeriesRequest) -> Result<ValidatedSeries, SessionError> {
    let mut missing = Vec::new();
    if request.patient_id.is_none() {
        missing.push("patientId");
    }
    if request.therapist_id.is_none() {
        missing.push("therapistId");
    }
    if request.start_time.is_none() {
        missing.push("startTime");
    }
    if request.periodicity.as_deref().map_or(true, |p| p.trim().is_empty()) {
        missing.push("periodicity");
    }

    let (Some(patient_id), Some(therapist_id), Some(start_time), Some(periodicity)) = (
        request.patient_id,
        request.therapist_id,
        request.start_time,
        request.periodicity.as_deref(),
    ) else {
        return Err(SessionError::MissingFields(missing.join(", ")));
    };
    if !missing.is_empty() {
        return Err(SessionError::MissingFields(missing.join(", ")));
    }

    let periodicity: Periodicity = periodicity.parse()?;
    if !periodicity.is_recurring() {
        return Err(SessionError::InvalidPeriodicity(periodicity.to_string()));
    }

    let follow_ups = request.number_of_follow_ups.unwrap_or(DEFAULT_FOLLOW_UPS);
    if !(MIN_FOLLOW_UPS..=MAX_FOLLOW_UPS).contains(&follow_ups) {
        return Err(SessionError::InvalidFollowUpCount(follow_ups));
    }

    let duration_minutes = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    if duration_minutes <= 0 {
        return Err(SessionError::ValidationError(
            "durationMinutes must be a positive number of minutes".to_string(),
        ));
    }

    Ok(ValidatedSeries {
        patient_id,
        therapist_id,
        start_time,
        periodicity,
        duration_minutes,
        number_of_follow_ups: follow_ups as usize,
        notes: request.notes.clone(),
    })
}

/// Builds the anchor plus every follow-up. The anchor id is generated here
/// so the whole series can be written in one batch.
pub fn build_series(
    series: &ValidatedSeries,
    clinic_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Session>, SessionError> {
    let anchor_id = Uuid::new_v4();
    let dates = follow_up_dates(series.start_time, series.periodicity, series.number_of_follow_ups)?;

    let occurrence = |id: Uuid, start_time: DateTime<Utc>, order: i32| Session {
        id,
        clinic_id,
        patient_id: series.patient_id,
        therapist_id: series.therapist_id,
        start_time,
        duration_minutes: series.duration_minutes,
        status: SessionStatus::Scheduled,
        is_follow_up: order > 0,
        parent_session_id: (order > 0).then_some(anchor_id),
        series_order: order,
        periodicity: series.periodicity,
        notes: series.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    let mut sessions = Vec::with_capacity(dates.len() + 1);
    sessions.push(occurrence(anchor_id, series.start_time, 0));
    for (index, start_time) in dates.into_iter().enumerate() {
        sessions.push(occurrence(Uuid::new_v4(), start_time, index as i32 + 1));
    }

    Ok(sessions)
}

/// Series creation plus the plain reads and edits around a series.
pub struct SeriesService {
    store: Arc<dyn SessionStore>,
    patients: Arc<dyn PatientDirectory>,
    staff: Arc<dyn StaffDirectory>,
    lifecycle: SessionLifecycleService,
    notifier: NotificationDispatcher,
}

impl SeriesService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        patients: Arc<dyn PatientDirectory>,
        staff: Arc<dyn StaffDirectory>,
        lifecycle: SessionLifecycleService,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { store, patients, staff, lifecycle, notifier }
    }

    pub async fn create_series(
        &self,
        tenant: &TenantContext,
        request: CreateSeriesRequest,
    ) -> Result<SeriesCreated, SessionError> {
        let series = validate_series_request(&request)?;
        info!("Creating {} series for patient {} with {} follow-ups",
              series.periodicity, series.patient_id, series.number_of_follow_ups);

        self.verify_patient(series.patient_id, tenant).await?;
        self.verify_therapist(series.therapist_id, tenant).await?;

        let sessions = build_series(&series, tenant.clinic_id, Utc::now())?;
        let ids = self.store.create_batch(sessions, tenant).await?;

        let (anchor_id, follow_up_ids) = match ids.split_first() {
            Some((anchor, rest)) => (*anchor, rest.to_vec()),
            None => return Err(SessionError::Persistence("Series insert returned no ids".to_string())),
        };

        self.notifier.series_created(ids.clone(), tenant.clinic_id);

        info!("Created series {} with {} sessions", anchor_id, ids.len());
        Ok(SeriesCreated {
            anchor_id,
            total_sessions: ids.len(),
            follow_up_session_ids: follow_up_ids,
            periodicity: series.periodicity,
        })
    }

    pub async fn verify_patient(&self, patient_id: Uuid, tenant: &TenantContext) -> Result<(), SessionError> {
        match self.patients.find_patient(patient_id, tenant).await? {
            Some(patient) if patient.clinic_id == tenant.clinic_id => Ok(()),
            Some(_) => {
                warn!("Patient {} belongs to another clinic", patient_id);
                Err(SessionError::PatientNotFound)
            }
            None => Err(SessionError::PatientNotFound),
        }
    }

    pub async fn verify_therapist(&self, therapist_id: Uuid, tenant: &TenantContext) -> Result<StaffMember, SessionError> {
        let staff = self.staff
            .find_staff(therapist_id, tenant)
            .await?
            .filter(|s| s.clinic_id == tenant.clinic_id)
            .ok_or(SessionError::TherapistNotFound)?;

        if !staff.can_hold_sessions() {
            warn!("Staff member {} has ineligible role {}", therapist_id, staff.role);
            return Err(SessionError::TherapistIneligible(staff.role));
        }

        Ok(staff)
    }

    pub async fn get_session(&self, tenant: &TenantContext, session_id: Uuid) -> Result<Session, SessionError> {
        self.store
            .find_by_id(session_id, tenant)
            .await?
            .ok_or(SessionError::SessionNotFound)
    }

    /// The full ordered series, whichever member `session_id` names.
    pub async fn get_series(&self, tenant: &TenantContext, session_id: Uuid) -> Result<Vec<Session>, SessionError> {
        let session = self.get_session(tenant, session_id).await?;
        let anchor_id = session.anchor_id();
        debug!("Loading series {} via session {}", anchor_id, session_id);

        let series = self.store.find_series_by_anchor_id(anchor_id, tenant).await?;
        if series.is_empty() {
            return Ok(vec![session]);
        }
        Ok(series)
    }

    pub async fn search_sessions(&self, tenant: &TenantContext, filter: SessionFilter) -> Result<Vec<Session>, SessionError> {
        if let (Some(from), Some(to)) = (filter.from_date, filter.to_date) {
            if from > to {
                return Err(SessionError::ValidationError("from_date must not be after to_date".to_string()));
            }
        }
        self.store.find_by_filters(&filter, tenant).await
    }

    pub async fn update_session(
        &self,
        tenant: &TenantContext,
        session_id: Uuid,
        request: UpdateSessionRequest,
    ) -> Result<Session, SessionError> {
        let current = self.get_session(tenant, session_id).await?;

        if let Some(status) = request.status {
            self.lifecycle.validate_status_transition(current.status, status)?;
        }
        if let Some(therapist_id) = request.therapist_id {
            self.verify_therapist(therapist_id, tenant).await?;
        }
        if matches!(request.duration_minutes, Some(d) if d <= 0) {
            return Err(SessionError::ValidationError(
                "durationMinutes must be a positive number of minutes".to_string(),
            ));
        }

        let patch = SessionPatch {
            start_time: None,
            status: request.status,
            therapist_id: request.therapist_id,
            notes: request.notes,
            duration_minutes: request.duration_minutes,
        };
        if patch.is_empty() {
            return Err(SessionError::ValidationError("No fields to update".to_string()));
        }

        if !self.store.update(session_id, &patch, tenant).await? {
            return Err(SessionError::SessionNotFound);
        }

        if patch.status == Some(SessionStatus::Cancelled) {
            self.notifier.cancelled(vec![session_id], tenant.clinic_id);
        }

        info!("Updated session {}", session_id);
        self.get_session(tenant, session_id).await
    }

    pub async fn delete_series(&self, tenant: &TenantContext, session_id: Uuid) -> Result<usize, SessionError> {
        let session = self.get_session(tenant, session_id).await?;
        let anchor_id = session.anchor_id();

        let deleted = self.store.delete_series(anchor_id, tenant).await?;
        warn!("Deleted series {} ({} sessions) in clinic {}", anchor_id, deleted, tenant.clinic_id);
        Ok(deleted)
    }
}
