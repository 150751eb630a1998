// libs/appointment-cell/src/services/rules.rs
//
// Eligibility rules. Each is a pure function of its arguments; the rule
// objects below adapt them to the engine's ordered pipeline.
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use tracing::debug;

use crate::models::{
    Appointment, RejectionReason, ScheduleCandidate, SchedulingContext, SchedulingPolicy, Student, Teacher,
};

// ==============================================================================
// PURE RULES
// ==============================================================================

/// New bookings must start at least `notice` after `now`.
pub fn check_advance_notice(
    candidate_time: DateTime<Utc>,
    now: DateTime<Utc>,
    is_new_booking: bool,
    notice: Duration,
) -> Result<(), RejectionReason> {
    if !is_new_booking {
        return Ok(());
    }
    // A notice that runs past the representable range can never be met.
    match now.checked_add_signed(notice) {
        Some(earliest) if candidate_time >= earliest => Ok(()),
        _ => Err(RejectionReason::InsufficientNotice),
    }
}

/// A class already inside the window may keep its time but not move.
pub fn check_modification_window(
    original_time: DateTime<Utc>,
    now: DateTime<Utc>,
    candidate_time: DateTime<Utc>,
    window: Duration,
) -> Result<(), RejectionReason> {
    if candidate_time == original_time {
        return Ok(());
    }
    match now.checked_add_signed(window) {
        Some(window_end) if original_time >= window_end => Ok(()),
        _ => Err(RejectionReason::ModificationTooLate),
    }
}

/// Number of non-canceled appointments `teacher_id` holds on `date`.
pub fn daily_teacher_load(
    teacher_id: &str,
    date: NaiveDate,
    appointments: &[Appointment],
    offset: FixedOffset,
) -> usize {
    appointments
        .iter()
        .filter(|appointment| appointment.teacher_id == teacher_id)
        .filter(|appointment| appointment.status.counts_toward_daily_load())
        .filter(|appointment| appointment.scheduled_at.with_timezone(&offset).date_naive() == date)
        .count()
}

pub fn check_teacher_capacity(
    teacher_id: &str,
    candidate_date: NaiveDate,
    appointments: &[Appointment],
    is_new_booking: bool,
    max_daily_classes: usize,
    offset: FixedOffset,
) -> Result<(), RejectionReason> {
    if !is_new_booking {
        return Ok(());
    }

    let load = daily_teacher_load(teacher_id, candidate_date, appointments, offset);
    debug!("Teacher {} holds {} classes on {}", teacher_id, load, candidate_date);

    if load >= max_daily_classes {
        return Err(RejectionReason::TeacherOverbooked);
    }
    Ok(())
}

pub fn check_teacher_active(teacher: &Teacher) -> Result<(), RejectionReason> {
    if !teacher.active {
        return Err(RejectionReason::TeacherInactive);
    }
    Ok(())
}

/// Advisory only. Compares calendar years, so a student born in 2010 counts
/// as 14 for all of 2024. Unknown birth dates never require the form.
pub fn requires_consent_form(student: &Student, now: DateTime<Utc>, consent_age: i32, offset: FixedOffset) -> bool {
    match student.date_of_birth {
        Some(date_of_birth) => now.with_timezone(&offset).year() - date_of_birth.year() < consent_age,
        None => false,
    }
}

// ==============================================================================
// RULE OBJECTS
// ==============================================================================

/// One blocking step of the evaluation pipeline.
pub trait EligibilityRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(
        &self,
        candidate: &ScheduleCandidate,
        context: &SchedulingContext<'_>,
        policy: &SchedulingPolicy,
    ) -> Result<(), RejectionReason>;
}

pub struct TeacherActiveRule;

impl EligibilityRule for TeacherActiveRule {
    fn name(&self) -> &'static str {
        "teacher_active"
    }

    fn check(
        &self,
        _candidate: &ScheduleCandidate,
        context: &SchedulingContext<'_>,
        _policy: &SchedulingPolicy,
    ) -> Result<(), RejectionReason> {
        check_teacher_active(context.teacher)
    }
}

/// Applies to new bookings only.
pub struct AdvanceNoticeRule;

impl EligibilityRule for AdvanceNoticeRule {
    fn name(&self) -> &'static str {
        "advance_notice"
    }

    fn check(
        &self,
        candidate: &ScheduleCandidate,
        context: &SchedulingContext<'_>,
        policy: &SchedulingPolicy,
    ) -> Result<(), RejectionReason> {
        check_advance_notice(
            candidate.scheduled_at,
            context.now,
            candidate.is_new_booking(),
            policy.advance_notice,
        )
    }
}

/// Applies to edits only.
pub struct ModificationWindowRule;

impl EligibilityRule for ModificationWindowRule {
    fn name(&self) -> &'static str {
        "modification_window"
    }

    fn check(
        &self,
        candidate: &ScheduleCandidate,
        context: &SchedulingContext<'_>,
        policy: &SchedulingPolicy,
    ) -> Result<(), RejectionReason> {
        match &candidate.original {
            Some(original) => check_modification_window(
                original.scheduled_at,
                context.now,
                candidate.scheduled_at,
                policy.modification_window,
            ),
            None => Ok(()),
        }
    }
}

pub struct TeacherCapacityRule;

impl EligibilityRule for TeacherCapacityRule {
    fn name(&self) -> &'static str {
        "teacher_capacity"
    }

    fn check(
        &self,
        candidate: &ScheduleCandidate,
        context: &SchedulingContext<'_>,
        policy: &SchedulingPolicy,
    ) -> Result<(), RejectionReason> {
        check_teacher_capacity(
            &candidate.teacher_id,
            policy.calendar_date(candidate.scheduled_at),
            context.appointments,
            candidate.is_new_booking(),
            policy.max_daily_classes_per_teacher,
            policy.calendar_offset,
        )
    }
}

/// The blocking rules in evaluation order.
pub fn standard_rules() -> Vec<Box<dyn EligibilityRule>> {
    vec![
        Box::new(TeacherActiveRule),
        Box::new(AdvanceNoticeRule),
        Box::new(ModificationWindowRule),
        Box::new(TeacherCapacityRule),
    ]
}
