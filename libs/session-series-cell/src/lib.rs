pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::SessionCellState;
pub use models::*;
pub use router::session_routes;

pub mod api {
    pub use crate::services::SessionServices;
    pub use crate::services::cancellation::CancellationService;
    pub use crate::services::directory::{InMemoryDirectory, PatientDirectory, StaffDirectory, SupabaseDirectory};
    pub use crate::services::lifecycle::SessionLifecycleService;
    pub use crate::services::notification::{
        LoggingNotificationTrigger, NotificationDispatcher, NotificationTrigger, SessionMove,
    };
    pub use crate::services::periodicity::{follow_up_dates, next_date};
    pub use crate::services::reschedule::CascadeRescheduler;
    pub use crate::services::series::SeriesService;
    pub use crate::services::store::{InMemorySessionStore, SessionStore};
    pub use crate::services::supabase_store::SupabaseSessionStore;
}
