// libs/session-series-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateSeriesRequest, RescheduleRequest, Session, SessionError, SessionFilter, SeriesDeleted,
    TenantContext, UpdateSessionRequest,
};
use crate::services::SessionServices;

/// Roles that may create, move or cancel sessions.
const STAFF_ROLES: &[&str] = &["admin", "staff", "therapist"];

#[derive(Clone)]
pub struct SessionCellState {
    pub config: Arc<AppConfig>,
    pub services: Arc<SessionServices>,
}

impl SessionCellState {
    pub fn new(config: Arc<AppConfig>, services: SessionServices) -> Self {
        Self {
            config,
            services: Arc::new(services),
        }
    }

    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let services = SessionServices::from_config(&config);
        Self::new(config, services)
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::MissingFields(_)
            | SessionError::InvalidPeriodicity(_)
            | SessionError::InvalidFollowUpCount(_)
            | SessionError::InvalidTime(_) => AppError::BadRequest(e.to_string()),
            SessionError::ValidationError(msg) => AppError::ValidationError(msg),
            SessionError::NoOpReschedule => AppError::BadRequest(e.to_string()),
            SessionError::TherapistIneligible(_) => AppError::BadRequest(e.to_string()),
            SessionError::PatientNotFound
            | SessionError::TherapistNotFound
            | SessionError::SessionNotFound => AppError::NotFound(e.to_string()),
            SessionError::InvalidStatusTransition { .. } => AppError::Conflict(e.to_string()),
            SessionError::Unauthorized => AppError::Auth(e.to_string()),
            SessionError::Persistence(msg) => AppError::Database(msg),
        }
    }
}

/// Body decode failures, such as a non-ISO timestamp, are reported as 400.
fn decode<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn tenant_for(user: &User, auth: &Authorization<Bearer>) -> Result<TenantContext, AppError> {
    TenantContext::from_user(user, auth.token())
        .map_err(|_| AppError::Auth("No clinic associated with this account".to_string()))
}

fn require_staff(user: &User) -> Result<(), AppError> {
    let is_staff = user.role.as_deref().map_or(false, |r| STAFF_ROLES.contains(&r));
    if !is_staff {
        return Err(AppError::Auth("Only clinic staff can manage sessions".to_string()));
    }
    Ok(())
}

/// Staff see everything in their clinic; patients only their own sessions.
fn ensure_can_view(user: &User, session: &Session) -> Result<(), AppError> {
    if require_staff(user).is_ok() {
        return Ok(());
    }
    if user.has_role("patient") && session.patient_id.to_string() == user.id {
        return Ok(());
    }
    Err(AppError::Auth("Not authorized to view this session".to_string()))
}

#[axum::debug_handler]
pub async fn create_series(
    State(state): State<SessionCellState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    payload: Result<Json<CreateSeriesRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_staff(&user)?;
    let request = decode(payload)?;
    let tenant = tenant_for(&user, &auth)?;

    let created = state.services.series.create_series(&tenant, request).await?;

    Ok((StatusCode::CREATED, Json(json!(created))))
}

#[axum::debug_handler]
pub async fn reschedule_session(
    State(state): State<SessionCellState>,
    Path(session_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    payload: Result<Json<RescheduleRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;
    let request = decode(payload)?;
    let tenant = tenant_for(&user, &auth)?;

    let new_start_time = request
        .new_start_time
        .ok_or_else(|| AppError::from(SessionError::MissingFields("newStartTime".to_string())))?;

    let outcome = state.services.rescheduler
        .reschedule(&tenant, session_id, new_start_time)
        .await?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn cancel_session(
    State(state): State<SessionCellState>,
    Path(session_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;
    let tenant = tenant_for(&user, &auth)?;

    state.services.cancellation.cancel_session(&tenant, session_id).await?;

    Ok(Json(json!({
        "message": "Session cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_series(
    State(state): State<SessionCellState>,
    Path(session_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;
    let tenant = tenant_for(&user, &auth)?;

    let cancelled = state.services.cancellation.cancel_series(&tenant, session_id).await?;

    Ok(Json(json!(cancelled)))
}

#[axum::debug_handler]
pub async fn get_series(
    State(state): State<SessionCellState>,
    Path(session_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Session>>, AppError> {
    let tenant = tenant_for(&user, &auth)?;

    let series = state.services.series.get_series(&tenant, session_id).await?;
    if let Some(first) = series.first() {
        ensure_can_view(&user, first)?;
    }

    Ok(Json(series))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<SessionCellState>,
    Path(session_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Session>, AppError> {
    let tenant = tenant_for(&user, &auth)?;

    let session = state.services.series.get_session(&tenant, session_id).await?;
    ensure_can_view(&user, &session)?;

    Ok(Json(session))
}

#[axum::debug_handler]
pub async fn update_session(
    State(state): State<SessionCellState>,
    Path(session_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    payload: Result<Json<UpdateSessionRequest>, JsonRejection>,
) -> Result<Json<Session>, AppError> {
    require_staff(&user)?;
    let request = decode(payload)?;
    let tenant = tenant_for(&user, &auth)?;

    let session = state.services.series.update_session(&tenant, session_id, request).await?;

    Ok(Json(session))
}

#[axum::debug_handler]
pub async fn search_sessions(
    State(state): State<SessionCellState>,
    Query(filter): Query<SessionFilter>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Session>>, AppError> {
    let tenant = tenant_for(&user, &auth)?;

    // Patients can only ever list their own sessions.
    let filter = if require_staff(&user).is_ok() {
        filter
    } else if user.has_role("patient") {
        let patient_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Invalid patient identity".to_string()))?;
        SessionFilter { patient_id: Some(patient_id), ..filter }
    } else {
        return Err(AppError::Auth("Not authorized to search sessions".to_string()));
    };

    let sessions = state.services.series.search_sessions(&tenant, filter).await?;

    Ok(Json(sessions))
}

#[axum::debug_handler]
pub async fn delete_series(
    State(state): State<SessionCellState>,
    Path(session_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<SeriesDeleted>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth("Only administrators can delete a series".to_string()));
    }
    let tenant = tenant_for(&user, &auth)?;

    let deleted_sessions = state.services.series.delete_series(&tenant, session_id).await?;

    Ok(Json(SeriesDeleted { deleted_sessions }))
}
