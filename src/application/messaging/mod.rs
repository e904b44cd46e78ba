//! Message handling - turns raw updates into domain messages

pub mod parser;

pub use parser::MessageParser;
