//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod inventory;
pub mod store;

pub use bot::{Bot, BotInfo, Document, KeyboardButton};
pub use inventory::PrizeInventory;
pub use store::TokenStore;
