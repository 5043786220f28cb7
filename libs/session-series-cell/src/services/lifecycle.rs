// libs/session-series-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{SessionError, SessionStatus};

/// Status state machine for sessions.
///
/// `scheduled -> completed` and `scheduled -> cancelled` are always allowed.
/// `completed -> cancelled` depends on `allow_cancel_completed`. Cancelled is
/// terminal and there is no way back to scheduled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionLifecycleService {
    allow_cancel_completed: bool,
}

impl SessionLifecycleService {
    pub fn new(allow_cancel_completed: bool) -> Self {
        Self { allow_cancel_completed }
    }

    pub fn validate_status_transition(
        &self,
        current_status: SessionStatus,
        new_status: SessionStatus,
    ) -> Result<(), SessionError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(SessionError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: SessionStatus) -> Vec<SessionStatus> {
        match current_status {
            SessionStatus::Scheduled => vec![SessionStatus::Completed, SessionStatus::Cancelled],
            SessionStatus::Completed if self.allow_cancel_completed => vec![SessionStatus::Cancelled],
            SessionStatus::Completed => vec![],
            SessionStatus::Cancelled => vec![],
        }
    }

    pub fn can_cancel(&self, current_status: SessionStatus) -> bool {
        self.get_valid_transitions(current_status).contains(&SessionStatus::Cancelled)
    }
}
