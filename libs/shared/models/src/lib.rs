pub mod auth;
pub mod envelope;
pub mod error;

pub use envelope::ApiEnvelope;
pub use error::{ApiError, AppError};
