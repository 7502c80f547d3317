pub mod prescription;
pub mod profile;
pub mod review;

pub use prescription::PrescriptionService;
pub use profile::ProfileService;
pub use review::ReviewService;
