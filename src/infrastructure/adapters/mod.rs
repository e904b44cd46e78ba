//! Messaging platform adapters

pub mod telegram;
