// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::{AppointmentStatus, SchedulingError};

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating status transition from {:?} to {:?}", current_status, new_status);

        if !self.valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {:?} -> {:?}", current_status, new_status);
            return Err(SchedulingError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        info!("Status transition validated: {:?} -> {:?}", current_status, new_status);
        Ok(())
    }

    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![AppointmentStatus::Completed, AppointmentStatus::Canceled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Canceled => vec![],
        }
    }

    /// Time and content edits are only possible while the class is scheduled.
    pub fn can_modify(&self, current_status: AppointmentStatus) -> bool {
        !current_status.is_terminal()
    }

    /// Cancellation ignores the notice window.
    pub fn can_cancel(&self, current_status: AppointmentStatus) -> bool {
        self.valid_transitions(current_status).contains(&AppointmentStatus::Canceled)
    }

    /// Scheduled classes whose start has passed become completed.
    pub fn automatic_transition(
        &self,
        current_status: AppointmentStatus,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled if scheduled_at <= now => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
