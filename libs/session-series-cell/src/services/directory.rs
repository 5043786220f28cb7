// libs/session-series-cell/src/services/directory.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, error};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Patient, SessionError, StaffMember, TenantContext};

/// Patient lookup owned by the patient-records part of the application.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// Tenant-scoped: a patient registered with another clinic is `None`.
    async fn find_patient(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<Patient>, SessionError>;
}

/// Staff lookup. Not tenant-scoped; callers compare `clinic_id` themselves.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn find_staff(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<StaffMember>, SessionError>;
}

pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn first_row<T>(&self, path: &str, tenant: &TenantContext) -> Result<Option<T>, SessionError>
    where T: serde::de::DeserializeOwned + Send {
        let rows: Vec<T> = self.supabase
            .request(Method::GET, path, tenant.token(), None)
            .await
            .map_err(|e| {
                error!("Directory lookup failed for {}: {}", path, e);
                SessionError::Persistence(e.to_string())
            })?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl PatientDirectory for SupabaseDirectory {
    async fn find_patient(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<Patient>, SessionError> {
        debug!("Looking up patient {} in clinic {}", id, tenant.clinic_id);
        let path = format!(
            "/rest/v1/patients?id=eq.{}&clinic_id=eq.{}&select=id,clinic_id,first_name,last_name",
            id, tenant.clinic_id
        );
        self.first_row(&path, tenant).await
    }
}

#[async_trait]
impl StaffDirectory for SupabaseDirectory {
    async fn find_staff(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<StaffMember>, SessionError> {
        debug!("Looking up staff member {}", id);
        let path = format!("/rest/v1/staff?id=eq.{}&select=id,clinic_id,role,job_title", id);
        self.first_row(&path, tenant).await
    }
}

/// Fixed directory for development and tests.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    patients: HashMap<Uuid, Patient>,
    staff: HashMap<Uuid, StaffMember>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patient(mut self, patient: Patient) -> Self {
        self.patients.insert(patient.id, patient);
        self
    }

    pub fn with_staff(mut self, staff: StaffMember) -> Self {
        self.staff.insert(staff.id, staff);
        self
    }
}

#[async_trait]
impl PatientDirectory for InMemoryDirectory {
    async fn find_patient(&self, id: Uuid, tenant: &TenantContext) -> Result<Option<Patient>, SessionError> {
        Ok(self.patients
            .get(&id)
            .filter(|p| p.clinic_id == tenant.clinic_id)
            .cloned())
    }
}

#[async_trait]
impl StaffDirectory for InMemoryDirectory {
    async fn find_staff(&self, id: Uuid, _tenant: &TenantContext) -> Result<Option<StaffMember>, SessionError> {
        Ok(self.staff.get(&id).cloned())
    }
}
