// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::services::booking::AppointmentBookingService;

pub fn appointment_routes(service: Arc<AppointmentBookingService>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/evaluate", post(handlers::evaluate_appointment))
        .route("/complete-elapsed", post(handlers::complete_elapsed_appointments))
        .route("/time-slots", get(handlers::get_time_slots))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .with_state(service)
}
