pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{chat_routes, ChatState};
pub use services::*;
