// libs/appointment-cell/src/services/booking.rs
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::rest::RestClient;

use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, BookingOutcome, Decision, ScheduleCandidate,
    ScheduleRequest, SchedulingContext, SchedulingError, SchedulingPolicy, Student, Teacher,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy::SchedulingPolicyEngine;
use crate::services::provider::{AppointmentWriter, RestSchedulingProvider, SchedulingDataProvider};
use crate::services::slots;

type SlotKey = (String, NaiveDate);

/// Fetches what the policy engine needs, asks it for a decision and only
/// then writes to the backend.
pub struct AppointmentBookingService {
    provider: Arc<dyn SchedulingDataProvider>,
    writer: Arc<dyn AppointmentWriter>,
    clock: Arc<dyn Clock>,
    engine: SchedulingPolicyEngine,
    lifecycle_service: AppointmentLifecycleService,
    booking_locks: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

struct Evaluation {
    candidate: ScheduleCandidate,
    decision: Decision,
    student: Student,
    teacher: Teacher,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let policy = SchedulingPolicy::from_config(config);
        let client = Arc::new(RestClient::new(config));
        let rest = Arc::new(RestSchedulingProvider::new(client, policy.calendar_offset));

        Self::with_components(rest.clone(), rest, Arc::new(SystemClock), policy)
    }

    pub fn with_components(
        provider: Arc<dyn SchedulingDataProvider>,
        writer: Arc<dyn AppointmentWriter>,
        clock: Arc<dyn Clock>,
        policy: SchedulingPolicy,
    ) -> Self {
        Self {
            provider,
            writer,
            clock,
            engine: SchedulingPolicyEngine::new(policy),
            lifecycle_service: AppointmentLifecycleService::new(),
            booking_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        self.engine.policy()
    }

    /// Dry run: the decision a create or edit would get right now.
    pub async fn evaluate_request(&self, request: &ScheduleRequest) -> Result<Decision, SchedulingError> {
        Ok(self.evaluate(request).await?.decision)
    }

    pub async fn book_appointment(&self, request: ScheduleRequest) -> Result<BookingOutcome, SchedulingError> {
        if request.appointment_id.is_some() {
            return Err(SchedulingError::ValidationError(
                "New bookings must not reference an existing appointment".to_string(),
            ));
        }

        info!(
            "Booking class for student {} with teacher {} at {}",
            request.student_id, request.teacher_id, request.scheduled_at
        );

        if !slots::is_on_slot(request.scheduled_at, self.policy().calendar_offset) {
            debug!("Requested time {} is off the half-hour grid", request.scheduled_at);
        }

        // Read and write under one lock per teacher and day so two bookings
        // in this process cannot both see the same free capacity.
        let date = self.policy().calendar_date(request.scheduled_at);
        let slot_lock = self.slot_lock(&request.teacher_id, date).await;
        let _guard = slot_lock.lock().await;

        let evaluation = self.evaluate(&request).await?;

        match evaluation.decision {
            Decision::Rejected { reason } => {
                warn!("Booking for teacher {} rejected: {}", request.teacher_id, reason);
                Ok(BookingOutcome::Rejected { reason })
            }
            Decision::Accepted { requires_consent_form } => {
                let appointment = Appointment {
                    id: None,
                    student_id: evaluation.candidate.student_id,
                    teacher_id: evaluation.candidate.teacher_id,
                    scheduled_at: evaluation.candidate.scheduled_at,
                    content: evaluation.candidate.content,
                    status: AppointmentStatus::Scheduled,
                    requires_consent_form,
                    student_name: Some(evaluation.student.name),
                    teacher_name: Some(evaluation.teacher.name),
                };

                let created = self.writer.create_appointment(&appointment).await?;

                info!("Class {:?} booked at {}", created.id, created.scheduled_at);
                if requires_consent_form {
                    info!("Student {} is under age, guardian consent form required", created.student_id);
                }

                Ok(BookingOutcome::Booked {
                    appointment: created,
                    requires_consent_form,
                })
            }
        }
    }

    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        mut request: ScheduleRequest,
    ) -> Result<BookingOutcome, SchedulingError> {
        request.appointment_id = Some(appointment_id.to_string());
        debug!("Updating appointment {}", appointment_id);

        let evaluation = self.evaluate(&request).await?;

        let requires_consent_form = match evaluation.decision {
            Decision::Rejected { reason } => {
                warn!("Update of appointment {} rejected: {}", appointment_id, reason);
                return Ok(BookingOutcome::Rejected { reason });
            }
            Decision::Accepted { requires_consent_form } => requires_consent_form,
        };

        let original = evaluation
            .candidate
            .original
            .ok_or_else(|| SchedulingError::AppointmentNotFound(appointment_id.to_string()))?;

        let appointment = Appointment {
            id: Some(appointment_id.to_string()),
            student_id: evaluation.candidate.student_id,
            teacher_id: evaluation.candidate.teacher_id,
            scheduled_at: evaluation.candidate.scheduled_at,
            content: evaluation.candidate.content,
            status: original.status,
            requires_consent_form,
            student_name: Some(evaluation.student.name),
            teacher_name: Some(evaluation.teacher.name),
        };

        let updated = self.writer.update_appointment(appointment_id, &appointment).await?;
        info!("Appointment {} updated", appointment_id);

        Ok(BookingOutcome::Booked {
            appointment: updated,
            requires_consent_form,
        })
    }

    /// Allowed from `Scheduled` at any time, including inside the notice window.
    pub async fn cancel_appointment(&self, appointment_id: &str) -> Result<Appointment, SchedulingError> {
        let appointment = self.provider.get_appointment(appointment_id).await?;

        if !self.lifecycle_service.can_cancel(appointment.status) {
            warn!("Appointment {} is {} and cannot be canceled", appointment_id, appointment.status);
            return Err(SchedulingError::InvalidStatusTransition {
                from: appointment.status,
                to: AppointmentStatus::Canceled,
            });
        }

        let canceled = Appointment {
            status: AppointmentStatus::Canceled,
            ..appointment
        };
        let updated = self.writer.update_appointment(appointment_id, &canceled).await?;

        info!("Appointment {} canceled", appointment_id);
        Ok(updated)
    }

    /// Marks every scheduled class whose time has passed as completed.
    pub async fn complete_elapsed_appointments(&self) -> Result<Vec<Appointment>, SchedulingError> {
        let now = self.clock.now();
        let appointments = self.provider.list_appointments(AppointmentFilter::default()).await?;

        let mut completed = Vec::new();
        for appointment in appointments {
            let Some(next_status) =
                self.lifecycle_service
                    .automatic_transition(appointment.status, appointment.scheduled_at, now)
            else {
                continue;
            };

            let Some(id) = appointment.id.clone() else {
                warn!("Skipping elapsed appointment without id at {}", appointment.scheduled_at);
                continue;
            };

            self.lifecycle_service
                .validate_status_transition(appointment.status, next_status)?;

            let updated = self
                .writer
                .update_appointment(
                    &id,
                    &Appointment {
                        status: next_status,
                        ..appointment
                    },
                )
                .await?;
            completed.push(updated);
        }

        info!("Completed {} elapsed appointments", completed.len());
        Ok(completed)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn evaluate(&self, request: &ScheduleRequest) -> Result<Evaluation, SchedulingError> {
        request.validate()?;

        let now = self.clock.now();
        let filter = AppointmentFilter::for_teacher_on(
            request.teacher_id.clone(),
            self.policy().calendar_date(request.scheduled_at),
        );

        let original = async {
            match request.appointment_id.as_deref() {
                Some(id) => self.provider.get_appointment(id).await.map(Some),
                None => Ok(None),
            }
        };

        let (appointments, student, teacher, original) = futures::try_join!(
            self.provider.list_appointments(filter),
            self.provider.get_student(&request.student_id),
            self.provider.get_teacher(&request.teacher_id),
            original,
        )?;

        let candidate = request.to_candidate(original);
        let context = SchedulingContext {
            appointments: &appointments,
            student: &student,
            teacher: &teacher,
            now,
        };
        let decision = self.engine.evaluate(&candidate, &context)?;

        Ok(Evaluation {
            candidate,
            decision,
            student,
            teacher,
        })
    }

    async fn slot_lock(&self, teacher_id: &str, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut locks = self.booking_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry((teacher_id.to_string(), date)).or_default().clone()
    }
}
