//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Permission denied")]
    PermissionDenied,
}

/// Token storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unknown token status: {0}")]
    UnknownStatus(String),

    #[error("Lock poisoned")]
    Poisoned,
}

/// Prize inventory (Google Sheets) errors
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Sheets API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Worksheet '{sheet}' has no column '{column}'")]
    MissingColumn { sheet: String, column: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Launcher errors
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Cannot resolve bot executable: {0}")]
    Executable(std::io::Error),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}
