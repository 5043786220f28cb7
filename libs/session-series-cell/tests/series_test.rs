// libs/session-series-cell/tests/series_test.rs
mod common;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use session_series_cell::models::{
    Periodicity, SessionError, SessionFilter, SessionStatus, TenantContext, UpdateSessionRequest,
};

use common::{series_start, NotificationEvent, TestClinic};

// ==============================================================================
// CREATE SERIES
// ==============================================================================

#[tokio::test]
async fn test_weekly_series_with_default_follow_ups() {
    let mut clinic = TestClinic::new();
    let mut request = clinic.weekly_request(8);
    request.number_of_follow_ups = None;
    request.duration_minutes = None;

    let created = clinic.services.series.create_series(&clinic.tenant, request).await.unwrap();

    assert_eq!(created.total_sessions, 9);
    assert_eq!(created.follow_up_session_ids.len(), 8);
    assert_eq!(created.periodicity, Periodicity::Weekly);

    let series = clinic.services.series.get_series(&clinic.tenant, created.anchor_id).await.unwrap();
    assert_eq!(series.len(), 9);

    let anchor = &series[0];
    assert_eq!(anchor.id, created.anchor_id);
    assert!(anchor.is_anchor());
    assert!(!anchor.is_follow_up);
    assert_eq!(anchor.start_time, series_start());
    assert_eq!(anchor.duration_minutes, 60);

    for (order, session) in series.iter().enumerate() {
        assert_eq!(session.series_order, order as i32);
        assert_eq!(session.status, SessionStatus::Scheduled);
        assert_eq!(session.clinic_id, clinic.tenant.clinic_id);
        assert_eq!(session.start_time, series_start() + Duration::weeks(order as i64));
        if order > 0 {
            assert!(session.is_follow_up);
            assert_eq!(session.parent_session_id, Some(created.anchor_id));
            assert_eq!(session.id, created.follow_up_session_ids[order - 1]);
        }
    }

    assert_eq!(
        series[8].start_time,
        Utc.with_ymd_and_hms(2025, 12, 20, 10, 0, 0).unwrap()
    );

    assert_matches!(
        clinic.next_event().await,
        Some(NotificationEvent::SeriesCreated(ids)) if ids.len() == 9 && ids[0] == created.anchor_id
    );
}

#[tokio::test]
async fn test_biweekly_series_spacing() {
    let clinic = TestClinic::new();
    let mut request = clinic.weekly_request(3);
    request.periodicity = Some("BiWeekly".to_string());

    let created = clinic.services.series.create_series(&clinic.tenant, request).await.unwrap();
    let series = clinic.services.series.get_series(&clinic.tenant, created.anchor_id).await.unwrap();

    let gaps: Vec<Duration> = series.windows(2).map(|w| w[1].start_time - w[0].start_time).collect();
    assert_eq!(gaps, vec![Duration::days(14); 3]);
    assert!(series.iter().all(|s| s.periodicity == Periodicity::BiWeekly));
}

#[tokio::test]
async fn test_monthly_series_clamps_to_month_end() {
    let clinic = TestClinic::new();
    let mut request = clinic.weekly_request(3);
    request.periodicity = Some("Monthly".to_string());
    request.start_time = Some(Utc.with_ymd_and_hms(2025, 1, 31, 9, 30, 0).unwrap());

    let created = clinic.services.series.create_series(&clinic.tenant, request).await.unwrap();
    let series = clinic.services.series.get_series(&clinic.tenant, created.anchor_id).await.unwrap();

    let dates: Vec<_> = series.iter().map(|s| s.start_time).collect();
    assert_eq!(dates, vec![
        Utc.with_ymd_and_hms(2025, 1, 31, 9, 30, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 2, 28, 9, 30, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, 28, 9, 30, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 4, 28, 9, 30, 0).unwrap(),
    ]);
}

#[tokio::test]
async fn test_missing_fields_are_listed() {
    let clinic = TestClinic::new();
    let mut request = clinic.weekly_request(4);
    request.patient_id = None;
    request.start_time = None;

    let result = clinic.services.series.create_series(&clinic.tenant, request).await;

    assert_matches!(result, Err(SessionError::MissingFields(fields)) => {
        assert!(fields.contains("patientId"));
        assert!(fields.contains("startTime"));
        assert!(!fields.contains("therapistId"));
    });
    assert!(clinic.store.is_empty().await);
}

#[tokio::test]
async fn test_unknown_periodicity_is_rejected() {
    let clinic = TestClinic::new();

    for label in ["Daily", "weekly", "None"] {
        let mut request = clinic.weekly_request(4);
        request.periodicity = Some(label.to_string());

        let result = clinic.services.series.create_series(&clinic.tenant, request).await;
        assert_matches!(result, Err(SessionError::InvalidPeriodicity(_)), "label {label}");
    }
    assert!(clinic.store.is_empty().await);
}

#[tokio::test]
async fn test_follow_up_count_bounds() {
    let clinic = TestClinic::new();

    for count in [0, -3, 51] {
        let result = clinic.services.series
            .create_series(&clinic.tenant, clinic.weekly_request(count))
            .await;
        assert_matches!(result, Err(SessionError::InvalidFollowUpCount(c)) if c == count);
    }

    let created = clinic.services.series
        .create_series(&clinic.tenant, clinic.weekly_request(50))
        .await
        .unwrap();
    assert_eq!(created.total_sessions, 51);
}

#[tokio::test]
async fn test_non_positive_duration_is_rejected() {
    let clinic = TestClinic::new();
    let mut request = clinic.weekly_request(2);
    request.duration_minutes = Some(0);

    let result = clinic.services.series.create_series(&clinic.tenant, request).await;
    assert_matches!(result, Err(SessionError::ValidationError(_)));
}

#[tokio::test]
async fn test_patient_from_another_clinic_is_not_found() {
    let clinic = TestClinic::new();
    let outsider = TenantContext::new(Uuid::new_v4());

    let result = clinic.services.series
        .create_series(&outsider, clinic.weekly_request(2))
        .await;

    assert_matches!(result, Err(SessionError::PatientNotFound));
    assert!(clinic.store.is_empty().await);
}

#[tokio::test]
async fn test_therapist_checks() {
    let clinic = TestClinic::new();

    let mut request = clinic.weekly_request(2);
    request.therapist_id = Some(Uuid::new_v4());
    assert_matches!(
        clinic.services.series.create_series(&clinic.tenant, request).await,
        Err(SessionError::TherapistNotFound)
    );

    let mut request = clinic.weekly_request(2);
    request.therapist_id = Some(clinic.receptionist.id);
    assert_matches!(
        clinic.services.series.create_series(&clinic.tenant, request).await,
        Err(SessionError::TherapistIneligible(role)) if role == "receptionist"
    );

    assert!(clinic.store.is_empty().await);
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_creation() {
    let mut clinic = TestClinic::builder().failing_notifications().build();

    let created = clinic.services.series
        .create_series(&clinic.tenant, clinic.weekly_request(2))
        .await
        .unwrap();

    assert_matches!(clinic.next_event().await, Some(NotificationEvent::SeriesCreated(_)));
    assert_eq!(clinic.store.len().await, 3);
    assert_eq!(created.total_sessions, 3);
}

// ==============================================================================
// READS AND EDITS
// ==============================================================================

#[tokio::test]
async fn test_series_lookup_from_any_member() {
    let mut clinic = TestClinic::new();
    let series = clinic.seed_weekly_series(4).await;

    let via_follow_up = clinic.services.series.get_series(&clinic.tenant, series[3].id).await.unwrap();
    assert_eq!(via_follow_up, series);

    let outsider = TenantContext::new(Uuid::new_v4());
    assert_matches!(
        clinic.services.series.get_series(&outsider, series[0].id).await,
        Err(SessionError::SessionNotFound)
    );
}

#[tokio::test]
async fn test_search_sessions_by_date_window() {
    let mut clinic = TestClinic::new();
    clinic.seed_weekly_series(4).await;

    let filter = SessionFilter {
        patient_id: Some(clinic.patient.id),
        from_date: Some(series_start() + Duration::days(1)),
        to_date: Some(series_start() + Duration::days(21)),
        ..SessionFilter::default()
    };
    let found = clinic.services.series.search_sessions(&clinic.tenant, filter).await.unwrap();

    assert_eq!(found.iter().map(|s| s.series_order).collect::<Vec<_>>(), vec![1, 2, 3]);

    let inverted = SessionFilter {
        from_date: Some(series_start() + Duration::days(7)),
        to_date: Some(series_start()),
        ..SessionFilter::default()
    };
    assert_matches!(
        clinic.services.series.search_sessions(&clinic.tenant, inverted).await,
        Err(SessionError::ValidationError(_))
    );
}

#[tokio::test]
async fn test_update_session_fields_and_status() {
    let mut clinic = TestClinic::new();
    let series = clinic.seed_weekly_series(2).await;

    let updated = clinic.services.series
        .update_session(&clinic.tenant, series[1].id, UpdateSessionRequest {
            status: Some(SessionStatus::Completed),
            notes: Some("Good range of motion".to_string()),
            ..UpdateSessionRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.status, SessionStatus::Completed);
    assert_eq!(updated.notes.as_deref(), Some("Good range of motion"));
    assert_eq!(updated.start_time, series[1].start_time);

    assert_matches!(
        clinic.services.series
            .update_session(&clinic.tenant, series[1].id, UpdateSessionRequest {
                status: Some(SessionStatus::Scheduled),
                ..UpdateSessionRequest::default()
            })
            .await,
        Err(SessionError::InvalidStatusTransition { from: SessionStatus::Completed, to: SessionStatus::Scheduled })
    );

    assert_matches!(
        clinic.services.series
            .update_session(&clinic.tenant, series[0].id, UpdateSessionRequest::default())
            .await,
        Err(SessionError::ValidationError(_))
    );
}

#[tokio::test]
async fn test_update_session_rejects_ineligible_therapist() {
    let mut clinic = TestClinic::new();
    let series = clinic.seed_weekly_series(1).await;

    let result = clinic.services.series
        .update_session(&clinic.tenant, series[0].id, UpdateSessionRequest {
            therapist_id: Some(clinic.receptionist.id),
            ..UpdateSessionRequest::default()
        })
        .await;

    assert_matches!(result, Err(SessionError::TherapistIneligible(_)));
}

#[tokio::test]
async fn test_delete_series_removes_every_member() {
    let mut clinic = TestClinic::new();
    let series = clinic.seed_weekly_series(3).await;
    let other = clinic.seed_weekly_series(1).await;

    let deleted = clinic.services.series.delete_series(&clinic.tenant, series[2].id).await.unwrap();

    assert_eq!(deleted, 4);
    assert_eq!(clinic.store.len().await, other.len());
    assert_matches!(
        clinic.services.series.get_session(&clinic.tenant, series[0].id).await,
        Err(SessionError::SessionNotFound)
    );
}
