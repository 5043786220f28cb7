// libs/session-series-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use shared_models::auth::User;

pub const DEFAULT_DURATION_MINUTES: i32 = 60;
pub const DEFAULT_FOLLOW_UPS: i64 = 8;
pub const MIN_FOLLOW_UPS: i64 = 1;
pub const MAX_FOLLOW_UPS: i64 = 50;

/// Roles allowed to be assigned as the treating clinician of a session.
pub const ELIGIBLE_STAFF_ROLES: &[&str] = &["therapist", "staff", "admin"];

// ==============================================================================
// CORE SESSION MODELS
// ==============================================================================

/// One occurrence of a treatment series, as stored in `therapy_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub status: SessionStatus,
    pub is_follow_up: bool,
    pub parent_session_id: Option<Uuid>,
    pub series_order: i32,
    pub periodicity: Periodicity,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_duration() -> i32 {
    DEFAULT_DURATION_MINUTES
}

impl Session {
    /// Id of the series anchor this session belongs to.
    pub fn anchor_id(&self) -> Uuid {
        match (self.is_follow_up, self.parent_session_id) {
            (true, Some(parent)) => parent,
            _ => self.id,
        }
    }

    pub fn is_anchor(&self) -> bool {
        self.series_order == 0 && self.parent_session_id.is_none()
    }

    pub fn end_time(&self) -> Result<DateTime<Utc>, SessionError> {
        self.start_time
            .checked_add_signed(chrono::Duration::minutes(self.duration_minutes as i64))
            .ok_or_else(|| SessionError::InvalidTime(format!("Session {} ends out of range", self.id)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Scheduled => write!(f, "scheduled"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Recurrence label. Copied onto every member of a series for display; the
/// dates themselves are never re-derived from it after creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Periodicity {
    Weekly,
    BiWeekly,
    Monthly,
    None,
}

impl Periodicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::Weekly => "Weekly",
            Periodicity::BiWeekly => "BiWeekly",
            Periodicity::Monthly => "Monthly",
            Periodicity::None => "None",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Periodicity::None)
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Periodicity {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Weekly" => Ok(Periodicity::Weekly),
            "BiWeekly" => Ok(Periodicity::BiWeekly),
            "Monthly" => Ok(Periodicity::Monthly),
            "None" => Ok(Periodicity::None),
            other => Err(SessionError::InvalidPeriodicity(other.to_string())),
        }
    }
}

// ==============================================================================
// TENANCY
// ==============================================================================

/// The clinic a request acts on behalf of, plus the caller's credentials
/// for stores that enforce row-level security.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub clinic_id: Uuid,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub auth_token: Option<String>,
}

impl TenantContext {
    pub fn new(clinic_id: Uuid) -> Self {
        Self {
            clinic_id,
            user_id: None,
            role: None,
            auth_token: None,
        }
    }

    pub fn from_user(user: &User, auth_token: &str) -> Result<Self, SessionError> {
        let clinic_id = user.clinic_id.ok_or(SessionError::Unauthorized)?;
        Ok(Self {
            clinic_id,
            user_id: Some(user.id.clone()),
            role: user.role.clone(),
            auth_token: Some(auth_token.to_string()),
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }
}

// ==============================================================================
// EXTERNAL ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffMember {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub role: String,
    pub job_title: Option<String>,
}

impl StaffMember {
    pub fn can_hold_sessions(&self) -> bool {
        ELIGIBLE_STAFF_ROLES.contains(&self.role.as_str())
    }
}

// ==============================================================================
// STORE MODELS
// ==============================================================================

/// Partial update of a session. Unset fields are left untouched and are
/// omitted from the serialized form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i32>,
}

impl SessionPatch {
    pub fn start_time(start_time: DateTime<Utc>) -> Self {
        Self { start_time: Some(start_time), ..Self::default() }
    }

    pub fn status(status: SessionStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, session: &mut Session, now: DateTime<Utc>) {
        if let Some(start_time) = self.start_time {
            session.start_time = start_time;
        }
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(therapist_id) = self.therapist_id {
            session.therapist_id = therapist_id;
        }
        if let Some(notes) = &self.notes {
            session.notes = Some(notes.clone());
        }
        if let Some(duration) = self.duration_minutes {
            session.duration_minutes = duration;
        }
        session.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUpdate {
    pub id: Uuid,
    #[serde(flatten)]
    pub patch: SessionPatch,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    pub patient_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        self.patient_id.map_or(true, |p| session.patient_id == p)
            && self.therapist_id.map_or(true, |t| session.therapist_id == t)
            && self.status.map_or(true, |s| session.status == s)
            && self.from_date.map_or(true, |from| session.start_time >= from)
            && self.to_date.map_or(true, |to| session.start_time <= to)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Body of `POST create-series`. Every field is optional at the wire level so
/// that missing values surface as `MissingFields` instead of a decode error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeriesRequest {
    pub patient_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub periodicity: Option<String>,
    pub duration_minutes: Option<i32>,
    pub number_of_follow_ups: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesCreated {
    pub anchor_id: Uuid,
    pub follow_up_session_ids: Vec<Uuid>,
    pub total_sessions: usize,
    pub periodicity: Periodicity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub new_start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleOutcome {
    pub updated_sessions: usize,
    /// Whole minutes, truncated toward zero. The applied shift keeps full precision.
    pub time_delta: i64,
    pub affected_session_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesCancelled {
    pub cancelled_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesDeleted {
    pub deleted_sessions: usize,
}

/// Direct field edit. `start_time` is deliberately absent: moving a session
/// goes through the cascade rescheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub status: Option<SessionStatus>,
    pub therapist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub duration_minutes: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Invalid periodicity '{0}', expected Weekly, BiWeekly or Monthly")]
    InvalidPeriodicity(String),

    #[error("numberOfFollowUps must be between 1 and 50, got {0}")]
    InvalidFollowUpCount(i64),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Therapist not found")]
    TherapistNotFound,

    #[error("Staff member cannot be assigned to sessions (role: {0})")]
    TherapistIneligible(String),

    #[error("Session not found")]
    SessionNotFound,

    #[error("New start time equals the current start time")]
    NoOpReschedule,

    #[error("Session cannot move from {from} to {to}")]
    InvalidStatusTransition { from: SessionStatus, to: SessionStatus },

    #[error("Not authorized for this clinic")]
    Unauthorized,

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Failure inside a notification hook. Logged, never returned to callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification dispatch failed: {0}")]
    Dispatch(String),

    #[error("Reminder bookkeeping failed for session {0}")]
    Reminder(Uuid),
}
