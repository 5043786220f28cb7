// libs/session-series-cell/src/services/supabase_store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Session, SessionError, SessionFilter, SessionPatch, SessionUpdate, TenantContext,
};
use crate::services::store::{ensure_tenant, SessionStore};

const SESSIONS_PATH: &str = "/rest/v1/therapy_sessions";
const UPDATE_BATCH_RPC: &str = "update_therapy_sessions_batch";
const DELETE_SERIES_RPC: &str = "delete_therapy_session_series";

/// `SessionStore` backed by the `therapy_sessions` table through PostgREST.
///
/// Batch inserts are a single multi-row `POST`, which PostgREST runs as one
/// statement. Batch updates and series deletion go through SQL functions so
/// each runs inside one transaction.
pub struct SupabaseSessionStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSessionStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn db_error(context: &str, err: anyhow::Error) -> SessionError {
        error!("{}: {}", context, err);
        SessionError::Persistence(format!("{}: {}", context, err))
    }

    fn timestamp(value: DateTime<Utc>) -> String {
        urlencoding::encode(&value.to_rfc3339_opts(SecondsFormat::Millis, true)).into_owned()
    }

    fn filter_query(filter: &SessionFilter, clinic_id: Uuid) -> String {
        let mut params = vec![format!("clinic_id=eq.{}", clinic_id)];

        if let Some(patient_id) = filter.patient_id {
            params.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(therapist_id) = filter.therapist_id {
            params.push(format!("therapist_id=eq.{}", therapist_id));
        }
        if let Some(status) = filter.status {
            params.push(format!("status=eq.{}", status));
        }
        if let Some(from) = filter.from_date {
            params.push(format!("start_time=gte.{}", Self::timestamp(from)));
        }
        if let Some(to) = filter.to_date {
            params.push(format!("start_time=lte.{}", Self::timestamp(to)));
        }
        params.push("order=start_time.asc,series_order.asc".to_string());
        if let Some(limit) = filter.limit {
            params.push(format!("limit={}", limit));
        }
        if let Some(offset) = filter.offset {
            params.push(format!("offset={}", offset));
        }

        params.join("&")
    }

    async fn fetch(&self, query: &str, tenant: &TenantContext) -> Result<Vec<Session>, SessionError> {
        let path = format!("{}?{}", SESSIONS_PATH, query);
        self.supabase
            .request::<Vec<Session>>(Method::GET, &path, tenant.token(), None)
            .await
            .map_err(|e| Self::db_error("Failed to load sessions", e))
    }
}

#[async_trait]
impl SessionStore for SupabaseSessionStore {
    async fn create(&self, session: Session, tenant: &TenantContext) -> Result<Uuid, SessionError> {
        let mut ids = self.create_batch(vec![session], tenant).await?;
        ids.pop().ok_or_else(|| SessionError::Persistence("Insert returned no id".to_string()))
    }

    async fn create_batch(&self, mut sessions: Vec<Session>, tenant: &TenantContext) -> Result<Vec<Uuid>, SessionError> {
        for session in sessions.iter_mut() {
            ensure_tenant(session, tenant)?;
            if session.id.is_nil() {
                session.id = Uuid::new_v4();
            }
        }

        let expected: Vec<Uuid> = sessions.iter().map(|s| s.id).collect();
        debug!("Inserting {} sessions for clinic {}", expected.len(), tenant.clinic_id);

        let inserted: Vec<Session> = self.supabase
            .request_with_headers(
                Method::POST,
                SESSIONS_PATH,
                tenant.token(),
                Some(json!(sessions)),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| Self::db_error("Failed to insert sessions", e))?;

        if inserted.len() != expected.len() {
            return Err(SessionError::Persistence(format!(
                "Expected {} inserted sessions, got {}", expected.len(), inserted.len()
            )));
        }

        info!("Inserted {} sessions for clinic {}", expected.len(), tenant.clinic_id);
        Ok(expected)
    }

    async fn find_by_id(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<Session>, SessionError> {
        let query = format!("id=eq.{}&clinic_id=eq.{}", id, tenant.clinic_id);
        Ok(self.fetch(&query, tenant).await?.into_iter().next())
    }

    async fn find_series_by_anchor_id(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<Vec<Session>, SessionError> {
        let query = format!(
            "clinic_id=eq.{}&or=(id.eq.{},parent_session_id.eq.{})&order=series_order.asc",
            tenant.clinic_id, anchor_id, anchor_id
        );
        self.fetch(&query, tenant).await
    }

    async fn find_by_filters(&self, filter: &SessionFilter, tenant: &TenantContext) -> Result<Vec<Session>, SessionError> {
        self.fetch(&Self::filter_query(filter, tenant.clinic_id), tenant).await
    }

    async fn update(&self, id: Uuid, patch: &SessionPatch, tenant: &TenantContext) -> Result<bool, SessionError> {
        let path = format!("{}?id=eq.{}&clinic_id=eq.{}", SESSIONS_PATH, id, tenant.clinic_id);

        let mut body = serde_json::to_value(patch)
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        if let Value::Object(fields) = &mut body {
            fields.insert("updated_at".to_string(), json!(Utc::now()));
        }

        let updated: Vec<Session> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                tenant.token(),
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| Self::db_error("Failed to update session", e))?;

        Ok(!updated.is_empty())
    }

    async fn update_batch(&self, updates: &[SessionUpdate], tenant: &TenantContext) -> Result<(), SessionError> {
        if updates.is_empty() {
            return Ok(());
        }

        // The function raises (and rolls back) unless every id matched.
        let updated: i64 = self.supabase
            .rpc(
                UPDATE_BATCH_RPC,
                tenant.token(),
                json!({
                    "p_clinic_id": tenant.clinic_id,
                    "p_updates": updates,
                }),
            )
            .await
            .map_err(|e| Self::db_error("Batch update failed", e))?;

        if updated != updates.len() as i64 {
            return Err(SessionError::Persistence(format!(
                "Batch update touched {} of {} sessions", updated, updates.len()
            )));
        }

        debug!("Batch updated {} sessions for clinic {}", updated, tenant.clinic_id);
        Ok(())
    }

    async fn delete_series(&self, anchor_id: Uuid, tenant: &TenantContext) -> Result<usize, SessionError> {
        let deleted: i64 = self.supabase
            .rpc(
                DELETE_SERIES_RPC,
                tenant.token(),
                json!({
                    "p_clinic_id": tenant.clinic_id,
                    "p_anchor_id": anchor_id,
                }),
            )
            .await
            .map_err(|e| Self::db_error("Series delete failed", e))?;

        info!("Deleted {} sessions of series {}", deleted, anchor_id);
        Ok(deleted.max(0) as usize)
    }
}
