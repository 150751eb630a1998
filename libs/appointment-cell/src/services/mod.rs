pub mod booking;
pub mod clock;
pub mod lifecycle;
pub mod policy;
pub mod provider;
pub mod rules;
pub mod slots;

pub use booking::AppointmentBookingService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use lifecycle::AppointmentLifecycleService;
pub use policy::SchedulingPolicyEngine;
pub use provider::{AppointmentWriter, RestSchedulingProvider, SchedulingDataProvider};
