//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: The roulette flow (generate, start, spin)
//! - Errors: Domain-specific errors
//! - Messaging: Message parsing

pub mod errors;
pub mod services;
pub mod messaging;
