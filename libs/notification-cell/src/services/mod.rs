pub mod hub;
pub mod notification;
pub mod refresh;

pub use hub::*;
pub use notification::*;
pub use refresh::*;
