pub mod cancellation;
pub mod directory;
pub mod lifecycle;
pub mod notification;
pub mod periodicity;
pub mod reschedule;
pub mod series;
pub mod store;
pub mod supabase_store;

use std::sync::Arc;

use tracing::{info, warn};

use shared_config::{AppConfig, SessionStoreBackend};
use shared_database::supabase::SupabaseClient;

use cancellation::CancellationService;
use directory::{InMemoryDirectory, PatientDirectory, StaffDirectory, SupabaseDirectory};
use lifecycle::SessionLifecycleService;
use notification::{LoggingNotificationTrigger, NotificationDispatcher, NotificationTrigger};
use reschedule::CascadeRescheduler;
use series::SeriesService;
use store::{InMemorySessionStore, SessionStore};
use supabase_store::SupabaseSessionStore;

/// Everything the session endpoints need, sharing one store and one
/// notification dispatcher.
pub struct SessionServices {
    pub series: SeriesService,
    pub rescheduler: CascadeRescheduler,
    pub cancellation: CancellationService,
}

impl SessionServices {
    pub fn new(
        store: Arc<dyn SessionStore>,
        patients: Arc<dyn PatientDirectory>,
        staff: Arc<dyn StaffDirectory>,
        trigger: Arc<dyn NotificationTrigger>,
        lifecycle: SessionLifecycleService,
    ) -> Self {
        let notifier = NotificationDispatcher::new(trigger);

        Self {
            series: SeriesService::new(
                Arc::clone(&store),
                patients,
                staff,
                lifecycle,
                notifier.clone(),
            ),
            rescheduler: CascadeRescheduler::new(Arc::clone(&store), notifier.clone()),
            cancellation: CancellationService::new(store, lifecycle, notifier),
        }
    }

    /// Wires the configured backend. Patient and staff lookups always go to
    /// Supabase when it is configured, regardless of the session backend.
    pub fn from_config(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        let store: Arc<dyn SessionStore> = match config.session_store_backend {
            SessionStoreBackend::Supabase => {
                info!("Using Supabase session store");
                Arc::new(SupabaseSessionStore::new(Arc::clone(&supabase)))
            }
            SessionStoreBackend::Memory => {
                warn!("Using in-memory session store; sessions are lost on restart");
                Arc::new(InMemorySessionStore::new())
            }
        };

        let (patients, staff): (Arc<dyn PatientDirectory>, Arc<dyn StaffDirectory>) = if config.is_configured() {
            let directory = Arc::new(SupabaseDirectory::new(supabase));
            (directory.clone() as Arc<dyn PatientDirectory>, directory as Arc<dyn StaffDirectory>)
        } else {
            warn!("Supabase not configured; patient and staff lookups will find nobody");
            let directory = Arc::new(InMemoryDirectory::new());
            (directory.clone() as Arc<dyn PatientDirectory>, directory as Arc<dyn StaffDirectory>)
        };

        let trigger = Arc::new(LoggingNotificationTrigger::new(config.reminder_lead_minutes.clone()));
        let lifecycle = SessionLifecycleService::new(config.allow_cancel_completed);

        Self::new(store, patients, staff, trigger, lifecycle)
    }
}
