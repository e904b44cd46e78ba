//! Domain layer - Core business logic with no external dependencies
//! 
//! This layer contains:
//! - Entities: Core business objects (User, Message, Prize, tokens)
//! - Traits: Abstractions for infrastructure (Bot, TokenStore, PrizeInventory)

pub mod entities;
pub mod traits;
