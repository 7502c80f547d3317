pub mod chat;
pub mod thread;

pub use chat::ChatService;
pub use thread::{ChatThread, ChatThreads};
