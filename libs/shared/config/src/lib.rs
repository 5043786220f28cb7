use std::env;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub session_store_backend: SessionStoreBackend,
    /// Whether a completed session may still be moved to cancelled.
    pub allow_cancel_completed: bool,
    /// Reminder offsets (minutes before start) re-created after a reschedule.
    pub reminder_lead_minutes: Vec<i64>,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let session_store_backend = match env::var("SESSION_STORE_BACKEND") {
            Ok(value) => Self::parse_backend(&value).unwrap_or_else(|| {
                warn!("Unknown SESSION_STORE_BACKEND '{}', falling back to memory", value);
                SessionStoreBackend::Memory
            }),
            Err(_) if !supabase_url.is_empty() => SessionStoreBackend::Supabase,
            Err(_) => {
                warn!("SESSION_STORE_BACKEND not set and Supabase not configured, using in-memory store");
                SessionStoreBackend::Memory
            }
        };

        let allow_cancel_completed = env::var("ALLOW_CANCEL_COMPLETED")
            .map(|v| Self::parse_flag(&v))
            .unwrap_or(false);

        let reminder_lead_minutes = env::var("REMINDER_LEAD_MINUTES")
            .ok()
            .and_then(|v| Self::parse_lead_minutes(&v))
            .unwrap_or_else(Self::default_reminder_lead_minutes);

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| {
                warn!("SERVER_PORT not set or invalid, using 3000");
                3000
            });

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_jwt_secret,
            session_store_backend,
            allow_cancel_completed,
            reminder_lead_minutes,
            server_port,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn default_reminder_lead_minutes() -> Vec<i64> {
        vec![24 * 60, 60]
    }

    fn parse_backend(value: &str) -> Option<SessionStoreBackend> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supabase" => Some(SessionStoreBackend::Supabase),
            "memory" | "in-memory" => Some(SessionStoreBackend::Memory),
            _ => None,
        }
    }

    fn parse_flag(value: &str) -> bool {
        matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    }

    fn parse_lead_minutes(value: &str) -> Option<Vec<i64>> {
        let parsed: Result<Vec<i64>, _> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<i64>)
            .collect();

        match parsed {
            Ok(leads) if !leads.is_empty() && leads.iter().all(|m| *m > 0) => Some(leads),
            _ => {
                warn!("REMINDER_LEAD_MINUTES '{}' is invalid, using defaults", value);
                None
            }
        }
    }
}
