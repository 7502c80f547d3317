pub mod appointment;
pub mod booking;
pub mod cache;
pub mod conflict;
pub mod lifecycle;

pub use appointment::AppointmentService;
pub use booking::{
    BookingBackend, BookingFlow, BookingSession, BookingSessions, BookingState, RemoteBookingBackend, SharedSession,
    SubmitOutcome,
};
pub use cache::AppointmentCache;
pub use conflict::{ConflictCategory, ConflictFeedback, ConflictFeedbackHandler, Recovery};
pub use lifecycle::AppointmentLifecycleService;
