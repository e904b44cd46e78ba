//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Database: Token persistence (SQLite)
//! - Adapters: Telegram Bot API
//! - Sheets: Prize inventory on Google Sheets
//! - Health: HTTP health check endpoint
//! - Launcher: Container entrypoint

pub mod adapters;
pub mod config;
pub mod database;
pub mod health;
pub mod launcher;
pub mod sheets;
