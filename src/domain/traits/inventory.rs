use async_trait::async_trait;
use crate::application::errors::InventoryError;
use crate::domain::entities::{Prize, User};

/// Source of prizes and ledger of winners
#[async_trait]
pub trait PrizeInventory: Send + Sync {
    /// Prizes with stock left
    async fn available_prizes(&self) -> Result<Vec<Prize>, InventoryError>;

    /// Count one more issue of `prize` and log `winner`
    async fn record_winner(&self, winner: &User, prize: &Prize) -> Result<(), InventoryError>;
}
