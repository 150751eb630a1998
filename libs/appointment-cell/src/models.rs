// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use shared_config::AppConfig;

/// Upper bound on the free-text lesson content.
pub const MAX_CONTENT_LENGTH: usize = 500;

/// Longest configurable notice or modification window, one year.
pub const MAX_NOTICE_HOURS: i64 = 24 * 366;

// ==============================================================================
// CORE ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Canceled)
    }

    /// Canceled classes free the teacher's slot; everything else occupies it.
    pub fn counts_toward_daily_load(&self) -> bool {
        !matches!(self, AppointmentStatus::Canceled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Absent until the backend has stored the appointment.
    pub id: Option<String>,
    pub student_id: String,
    pub teacher_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub content: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub requires_consent_form: bool,
    /// Display cache only.
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub active: bool,
}

// ==============================================================================
// EVALUATION INPUTS
// ==============================================================================

/// Proposed appointment fields, plus the stored appointment when editing.
#[derive(Debug, Clone)]
pub struct ScheduleCandidate {
    pub student_id: String,
    pub teacher_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub content: String,
    pub original: Option<Appointment>,
}

impl ScheduleCandidate {
    pub fn new_booking(
        student_id: impl Into<String>,
        teacher_id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            teacher_id: teacher_id.into(),
            scheduled_at,
            content: content.into(),
            original: None,
        }
    }

    pub fn edit_of(original: Appointment, scheduled_at: DateTime<Utc>, content: impl Into<String>) -> Self {
        Self {
            student_id: original.student_id.clone(),
            teacher_id: original.teacher_id.clone(),
            scheduled_at,
            content: content.into(),
            original: Some(original),
        }
    }

    pub fn is_new_booking(&self) -> bool {
        self.original.is_none()
    }

    pub fn validate(&self) -> Result<(), SchedulingError> {
        validate_fields(&self.student_id, &self.teacher_id, &self.content)
    }
}

/// Everything `evaluate` reads besides the candidate. Supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct SchedulingContext<'a> {
    pub appointments: &'a [Appointment],
    pub student: &'a Student,
    pub teacher: &'a Teacher,
    pub now: DateTime<Utc>,
}

fn validate_fields(student_id: &str, teacher_id: &str, content: &str) -> Result<(), SchedulingError> {
    if student_id.trim().is_empty() {
        return Err(SchedulingError::ValidationError("Student is required".to_string()));
    }
    if teacher_id.trim().is_empty() {
        return Err(SchedulingError::ValidationError("Teacher is required".to_string()));
    }
    if content.trim().is_empty() {
        return Err(SchedulingError::ValidationError("Class content is required".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(SchedulingError::ValidationError(format!(
            "Class content must be at most {} characters",
            MAX_CONTENT_LENGTH
        )));
    }
    Ok(())
}

// ==============================================================================
// DECISIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("Appointments must be booked at least the minimum advance notice ahead of the class")]
    InsufficientNotice,

    #[error("Classes inside the modification window cannot be rescheduled")]
    ModificationTooLate,

    #[error("Teacher has already reached the daily class limit for this date")]
    TeacherOverbooked,

    #[error("Teacher is not currently active")]
    TeacherInactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    Accepted { requires_consent_form: bool },
    Rejected { reason: RejectionReason },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }

    pub fn requires_consent_form(&self) -> bool {
        matches!(self, Decision::Accepted { requires_consent_form: true })
    }

    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Decision::Rejected { reason } => Some(*reason),
            Decision::Accepted { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Decision::Accepted { requires_consent_form: false } => "Class can be scheduled".to_string(),
            Decision::Accepted { requires_consent_form: true } => {
                "Class can be scheduled; the student is under age and needs a guardian consent form".to_string()
            }
            Decision::Rejected { reason } => reason.to_string(),
        }
    }
}

// ==============================================================================
// POLICY
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    pub advance_notice: Duration,
    pub modification_window: Duration,
    pub max_daily_classes_per_teacher: usize,
    pub consent_age_threshold: i32,
    /// Offset used to turn an instant into a calendar date or year.
    pub calendar_offset: FixedOffset,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            advance_notice: Duration::hours(24),
            modification_window: Duration::hours(24),
            max_daily_classes_per_teacher: 2,
            consent_age_threshold: 16,
            calendar_offset: Utc.fix(),
        }
    }
}

impl SchedulingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();

        let calendar_offset = config
            .calendar_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!(
                    "Calendar offset of {} minutes is out of range, using UTC",
                    config.calendar_utc_offset_minutes
                );
                defaults.calendar_offset
            });

        let advance_notice = Some(config.advance_notice_hours)
            .filter(|hours| (1..=MAX_NOTICE_HOURS).contains(hours))
            .and_then(Duration::try_hours)
            .unwrap_or_else(|| {
                warn!(
                    "Advance notice of {} hours is outside 1..={}, using {} hours",
                    config.advance_notice_hours,
                    MAX_NOTICE_HOURS,
                    defaults.advance_notice.num_hours()
                );
                defaults.advance_notice
            });

        Self {
            advance_notice,
            modification_window: advance_notice,
            max_daily_classes_per_teacher: config.max_daily_classes_per_teacher,
            consent_age_threshold: config.consent_age_threshold,
            calendar_offset,
        }
    }

    pub fn calendar_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.calendar_offset).date_naive()
    }

    pub fn calendar_year(&self, instant: DateTime<Utc>) -> i32 {
        instant.with_timezone(&self.calendar_offset).year()
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub student_id: String,
    pub teacher_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub content: String,
    /// Set when the request edits an existing appointment.
    #[serde(default)]
    pub appointment_id: Option<String>,
}

impl ScheduleRequest {
    pub fn validate(&self) -> Result<(), SchedulingError> {
        validate_fields(&self.student_id, &self.teacher_id, &self.content)
    }

    pub fn to_candidate(&self, original: Option<Appointment>) -> ScheduleCandidate {
        ScheduleCandidate {
            student_id: self.student_id.clone(),
            teacher_id: self.teacher_id.clone(),
            scheduled_at: self.scheduled_at,
            content: self.content.clone(),
            original,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub teacher_id: Option<String>,
    pub date: Option<NaiveDate>,
}

impl AppointmentFilter {
    pub fn for_teacher_on(teacher_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            teacher_id: Some(teacher_id.into()),
            date: Some(date),
        }
    }

    pub fn matches(&self, appointment: &Appointment, offset: FixedOffset) -> bool {
        let teacher_matches = self
            .teacher_id
            .as_deref()
            .map_or(true, |teacher_id| appointment.teacher_id == teacher_id);
        let date_matches = self
            .date
            .map_or(true, |date| appointment.scheduled_at.with_timezone(&offset).date_naive() == date);
        teacher_matches && date_matches
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    Booked {
        appointment: Appointment,
        requires_consent_form: bool,
    },
    Rejected {
        reason: RejectionReason,
    },
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Hard failures. Business-rule rejections travel inside `Decision` instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("{entity} {id} not found")]
    ReferenceNotFound { entity: &'static str, id: String },

    #[error("Appointment {0} not found")]
    AppointmentNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Appointment cannot be modified in current status: {0}")]
    ImmutableAppointment(AppointmentStatus),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Invalid backend payload: {0}")]
    InvalidPayload(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}
