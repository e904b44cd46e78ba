use async_trait::async_trait;
use crate::application::errors::BotError;

/// Bot trait - abstraction for the messaging platform
#[async_trait]
pub trait Bot: Send + Sync {
    /// Send a plain text message, returns the new message id
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError>;

    /// Send a message rendered as Telegram HTML
    async fn send_html(&self, chat_id: &str, text: &str) -> Result<String, BotError>;

    /// Send a message with inline keyboard
    async fn send_with_keyboard(&self, chat_id: &str, text: &str, buttons: Vec<Vec<KeyboardButton>>) -> Result<String, BotError>;

    /// Upload a file held in memory
    async fn send_document(&self, chat_id: &str, document: Document, caption: Option<&str>) -> Result<String, BotError>;

    /// Send an animated dice (🎰, 🎲, ...)
    async fn send_dice(&self, chat_id: &str, emoji: &str) -> Result<String, BotError>;

    /// Drop the inline keyboard from a sent message
    async fn remove_keyboard(&self, chat_id: &str, message_id: &str) -> Result<(), BotError>;

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<(), BotError>;

    /// Answer a callback query
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Keyboard button for inline keyboards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub text: String,
    pub callback_data: Option<String>,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
        }
    }

    pub fn with_callback(mut self, data: impl Into<String>) -> Self {
        self.callback_data = Some(data.into());
        self
    }
}

/// In-memory file for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
