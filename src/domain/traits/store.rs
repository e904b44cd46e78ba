use async_trait::async_trait;
use crate::application::errors::StorageError;
use crate::domain::entities::TokenStatus;

/// Persistence for invite tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store new tokens as active; returns the ones that were not already present
    async fn add_tokens(&self, tokens: &[String]) -> Result<Vec<String>, StorageError>;

    async fn status(&self, token: &str) -> Result<Option<TokenStatus>, StorageError>;

    /// Move an active token to pending. False when the token is not active.
    async fn claim(&self, token: &str) -> Result<bool, StorageError>;

    /// Return a pending token to active
    async fn release(&self, token: &str) -> Result<(), StorageError>;

    async fn mark_used(&self, token: &str) -> Result<(), StorageError>;
}
