//! SQLite token storage

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::application::errors::StorageError;
use crate::domain::entities::TokenStatus;
use crate::domain::traits::TokenStore;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: impl AsRef<Path>) -> SqliteResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> SqliteResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqliteResult<Self> {
        Self::init_tables(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_tables(conn: &Connection) -> SqliteResult<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                token TEXT PRIMARY KEY,
                status TEXT DEFAULT 'active'
            )",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn insert_tokens(&self, tokens: &[String]) -> Result<Vec<String>, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(tokens.len());
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO tokens (token, status) VALUES (?1, 'active')"
            )?;
            for token in tokens {
                if stmt.execute([token])? > 0 {
                    inserted.push(token.clone());
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn token_status(&self, token: &str) -> Result<Option<TokenStatus>, StorageError> {
        let conn = self.lock()?;
        let status: Option<Option<String>> = conn
            .query_row("SELECT status FROM tokens WHERE token = ?1", [token], |row| row.get(0))
            .optional()?;

        match status {
            None => Ok(None),
            // NULL status counts as active, like the column default
            Some(None) => Ok(Some(TokenStatus::Active)),
            Some(Some(s)) => s.parse().map(Some).map_err(StorageError::UnknownStatus),
        }
    }

    /// Compare-and-set from one status to another; true when a row changed
    pub fn transition(&self, token: &str, from: TokenStatus, to: TokenStatus) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE tokens SET status = ?1 WHERE token = ?2 AND COALESCE(status, 'active') = ?3",
            [to.as_str(), token, from.as_str()],
        )?;
        Ok(rows > 0)
    }

    pub fn set_status(&self, token: &str, status: TokenStatus) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE tokens SET status = ?1 WHERE token = ?2",
            [status.as_str(), token],
        )?;
        Ok(())
    }

    pub fn count_by_status(&self, status: TokenStatus) -> Result<i64, StorageError> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE COALESCE(status, 'active') = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Tokens left pending by an interrupted spin go back to active
    pub fn recover_pending(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE tokens SET status = 'active' WHERE status = 'pending'",
            [],
        )?;
        Ok(rows)
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn add_tokens(&self, tokens: &[String]) -> Result<Vec<String>, StorageError> {
        self.insert_tokens(tokens)
    }

    async fn status(&self, token: &str) -> Result<Option<TokenStatus>, StorageError> {
        self.token_status(token)
    }

    async fn claim(&self, token: &str) -> Result<bool, StorageError> {
        self.transition(token, TokenStatus::Active, TokenStatus::Pending)
    }

    async fn release(&self, token: &str) -> Result<(), StorageError> {
        self.transition(token, TokenStatus::Pending, TokenStatus::Active)?;
        Ok(())
    }

    async fn mark_used(&self, token: &str) -> Result<(), StorageError> {
        self.set_status(token, TokenStatus::Used)
    }
}
