// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::error::AppError;

use crate::models::{BookingOutcome, ScheduleRequest, SchedulingError};
use crate::services::booking::AppointmentBookingService;
use crate::services::slots;

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::ReferenceNotFound { .. } | SchedulingError::AppointmentNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            SchedulingError::ValidationError(msg) => AppError::ValidationError(msg),
            SchedulingError::ImmutableAppointment(_) | SchedulingError::InvalidStatusTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            SchedulingError::InvalidPayload(_) | SchedulingError::BackendError(_) => {
                AppError::ExternalService(err.to_string())
            }
        }
    }
}

fn parse_request(payload: Result<Json<ScheduleRequest>, JsonRejection>) -> Result<ScheduleRequest, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    request.validate()?;
    Ok(request)
}

fn outcome_response(outcome: BookingOutcome, success_status: StatusCode) -> (StatusCode, Json<Value>) {
    match outcome {
        BookingOutcome::Booked {
            appointment,
            requires_consent_form,
        } => (
            success_status,
            Json(json!({
                "success": true,
                "appointment": appointment,
                "requires_consent_form": requires_consent_form,
            })),
        ),
        BookingOutcome::Rejected { reason } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "success": false,
                "reason": reason,
                "message": reason.to_string(),
            })),
        ),
    }
}

// ==============================================================================
// HANDLERS
// ==============================================================================

/// Dry run of the scheduling rules. Nothing is written.
#[axum::debug_handler]
pub async fn evaluate_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = parse_request(payload)?;
    let decision = service.evaluate_request(&request).await?;

    Ok(Json(json!({
        "decision": decision,
        "message": decision.message(),
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request = parse_request(payload)?;
    let outcome = service.book_appointment(request).await?;

    Ok(outcome_response(outcome, StatusCode::CREATED))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Path(appointment_id): Path<String>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let request = parse_request(payload)?;
    let outcome = service.update_appointment(&appointment_id, request).await?;

    Ok(outcome_response(outcome, StatusCode::OK))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment = service.cancel_appointment(&appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn complete_elapsed_appointments(
    State(service): State<Arc<AppointmentBookingService>>,
) -> Result<Json<Value>, AppError> {
    let completed = service.complete_elapsed_appointments().await?;
    debug!("{} appointments moved to completed", completed.len());

    Ok(Json(json!({
        "completed": completed.len(),
        "appointments": completed,
    })))
}

pub async fn get_time_slots() -> Json<Value> {
    let slots: Vec<String> = slots::time_slots()
        .iter()
        .map(|slot| slot.format("%H:%M").to_string())
        .collect();

    Json(json!({ "slots": slots }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, RejectionReason};

    #[test]
    fn scheduling_errors_map_to_http_statuses() {
        let cases = [
            (
                SchedulingError::ReferenceNotFound {
                    entity: "teacher",
                    id: "t9".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (SchedulingError::AppointmentNotFound("a9".to_string()), StatusCode::NOT_FOUND),
            (SchedulingError::ValidationError("empty".to_string()), StatusCode::BAD_REQUEST),
            (
                SchedulingError::ImmutableAppointment(AppointmentStatus::Completed),
                StatusCode::CONFLICT,
            ),
            (SchedulingError::BackendError("down".to_string()), StatusCode::BAD_GATEWAY),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn rejected_outcome_is_unprocessable() {
        let (status, Json(body)) = outcome_response(
            BookingOutcome::Rejected {
                reason: RejectionReason::TeacherOverbooked,
            },
            StatusCode::CREATED,
        );
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["reason"], "teacher_overbooked");
        assert_eq!(body["success"], false);
    }
}
