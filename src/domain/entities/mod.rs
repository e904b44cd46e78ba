//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod prize;
pub mod token;

pub use user::User;
pub use message::{Message, Content};
pub use prize::Prize;
pub use token::TokenStatus;
