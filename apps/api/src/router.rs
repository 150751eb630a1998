use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::services::booking::AppointmentBookingService;

pub fn create_router(booking_service: Arc<AppointmentBookingService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Class scheduling API is running!" }))
        .nest("/appointments", appointment_routes(booking_service))
}
