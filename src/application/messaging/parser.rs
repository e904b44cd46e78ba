//! Message parser - Parses raw text and button presses into structured messages

use crate::domain::entities::{Message, Content, User};

/// Parses incoming messages into structured Message objects
pub struct MessageParser {
    bot_username: String,
}

impl MessageParser {
    pub fn new(bot_username: impl Into<String>) -> Self {
        Self {
            bot_username: bot_username.into(),
        }
    }

    /// Parse a text message
    pub fn parse(&self, chat_id: impl Into<String>, text: impl Into<String>, sender: Option<User>) -> Message {
        let text = text.into();
        let chat_id = chat_id.into();

        if let Some(content) = self.parse_command(&text) {
            return Message::new(chat_id, content).with_sender_opt(sender);
        }

        Message::new(chat_id, Content::Text(text)).with_sender_opt(sender)
    }

    /// `/name[@bot] args...`; None for plain text or commands aimed at another bot
    fn parse_command(&self, text: &str) -> Option<Content> {
        let cmd_text = text.trim().strip_prefix('/')?;

        let mut parts = cmd_text.split_whitespace();
        let head = parts.next()?;
        let name = match head.split_once('@') {
            Some((name, target)) if target.eq_ignore_ascii_case(&self.bot_username) => name,
            Some(_) => return None,
            None => head,
        };
        if name.is_empty() {
            return None;
        }

        Some(Content::Command {
            name: name.to_lowercase(),
            args: parts.map(|s| s.to_string()).collect(),
        })
    }

    /// Parse a callback query (inline button press)
    pub fn parse_callback(&self, chat_id: impl Into<String>, data: impl Into<String>, user: User) -> Message {
        Message::new(chat_id, Content::CallbackData(data.into()))
            .with_sender(user)
    }
}
