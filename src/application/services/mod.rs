//! Application services - Business logic orchestration

pub mod roulette_service;

pub use roulette_service::{RouletteService, RouletteSettings};
