//! Telegram adapter

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::errors::BotError;
use crate::application::messaging::MessageParser;
use crate::domain::entities;
use crate::domain::traits::{Bot, BotInfo, Document, KeyboardButton};

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

#[derive(Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Serialize)]
struct InlineKeyboardButton {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_data: Option<String>,
}

fn parse_message_id(message_id: &str) -> Result<i64, BotError> {
    message_id
        .parse()
        .map_err(|_| BotError::Parse(format!("invalid message id '{}'", message_id)))
}

impl From<User> for entities::User {
    fn from(user: User) -> Self {
        let mut domain = entities::User::new(user.id.to_string());
        domain.username = user.username;
        domain.first_name = user.first_name;
        domain.last_name = user.last_name;
        domain.is_bot = user.is_bot;
        domain
    }
}

impl Update {
    /// Convert into a domain message; None for update kinds the bot ignores
    pub fn into_message(self, parser: &MessageParser) -> Option<entities::Message> {
        if let Some(msg) = self.message {
            let text = msg.text?;
            let sender = msg.from.map(entities::User::from);
            return Some(
                parser
                    .parse(msg.chat.id.to_string(), text, sender)
                    .with_id(msg.message_id.to_string()),
            );
        }

        let cb = self.callback_query?;
        let user = entities::User::from(cb.from);
        // Callbacks on inaccessible messages still get answered; reply to the presser
        let (chat_id, message_id) = match cb.message {
            Some(m) => (m.chat.id.to_string(), m.message_id.to_string()),
            None => (user.id.clone(), String::new()),
        };
        Some(
            parser
                .parse_callback(chat_id, cb.data.unwrap_or_default(), user)
                .with_id(message_id)
                .with_callback_id(cb.id),
        )
    }
}

/// Telegram bot adapter
pub struct TelegramAdapter {
    token: String,
    client: Client,
    info: BotInfo,
}

impl TelegramAdapter {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: Client::new(),
            info: BotInfo {
                id: "unknown".to_string(),
                name: "roulette-bot".to_string(),
                username: "roulette_bot".to_string(),
            },
        }
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }

    /// Token prefix safe to put in logs
    fn redacted_token(&self) -> &str {
        match self.token.find(':') {
            Some(end) => &self.token[..end],
            None => {
                let end = self.token.char_indices().nth(8).map_or(self.token.len(), |(i, _)| i);
                &self.token[..end]
            }
        }
    }

    /// Log line announcing the adapter, without leaking the secret half of the token
    pub fn describe(&self) -> String {
        format!("@{} (token: {}:***)", self.info.username, self.redacted_token())
    }

    /// POST a JSON request and unwrap the `{ok, result}` envelope
    async fn call<T, R>(&self, method: &str, request: &R) -> Result<T, BotError>
    where
        T: DeserializeOwned,
        R: Serialize + ?Sized,
    {
        let response = self.client
            .post(self.api_url(method))
            .json(request)
            .send()
            .await
            .map_err(|e| BotError::Network(e.without_url().to_string()))?;

        Self::unwrap_response(method, response).await
    }

    async fn unwrap_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T, BotError> {
        let status = response.status();
        let data: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| BotError::Parse(format!("{}: {}", method, e.without_url())))?;

        if !data.ok {
            let description = data.description.unwrap_or_else(|| status.to_string());
            return Err(BotError::Api(format!("{}: {}", method, description)));
        }

        data.result
            .ok_or_else(|| BotError::Parse(format!("{}: missing result", method)))
    }

    /// Fetch bot info from Telegram API
    pub async fn fetch_bot_info(&mut self) -> Result<(), BotError> {
        #[derive(Deserialize)]
        struct BotInfoResponse {
            id: i64,
            first_name: String,
            username: String,
        }

        let data: BotInfoResponse = self.call("getMe", &serde_json::json!({})).await?;

        self.info = BotInfo {
            id: data.id.to_string(),
            name: data.first_name,
            username: data.username,
        };

        Ok(())
    }

    /// Get updates from Telegram using getUpdates API
    pub async fn get_updates(&self, offset: i64, timeout: i64) -> Result<Vec<Update>, BotError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest {
            offset: i64,
            timeout: i64,
            allowed_updates: Vec<String>,
        }

        let request = GetUpdatesRequest {
            offset,
            timeout,
            allowed_updates: vec!["message".to_string(), "callback_query".to_string()],
        };

        // Leave headroom over the long-poll window
        let response = self.client
            .post(self.api_url("getUpdates"))
            .timeout(Duration::from_secs(timeout.max(0) as u64 + 10))
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::Network(e.without_url().to_string()))?;

        Self::unwrap_response("getUpdates", response).await
    }

    /// Get the next update offset
    pub fn get_next_offset(updates: &[Update]) -> Option<i64> {
        updates.iter()
            .map(|u| u.update_id + 1)
            .max()
    }

    /// Drop updates queued while the bot was offline; returns the offset to poll from
    pub async fn skip_pending_updates(&self) -> Result<i64, BotError> {
        let updates = self.get_updates(-1, 0).await?;
        let offset = Self::get_next_offset(&updates).unwrap_or(0);
        if offset > 0 {
            tracing::info!("Skipped pending updates up to {}", offset - 1);
        }
        Ok(offset)
    }

    /// Register bot commands with Telegram
    pub async fn register_commands(&self) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct Command {
            command: String,
            description: String,
        }

        #[derive(Serialize)]
        struct SetMyCommandsRequest {
            commands: Vec<Command>,
        }

        let commands = vec![
            Command { command: "start".to_string(), description: "Open an invite link".to_string() },
            Command { command: "generate".to_string(), description: "Generate invite links (admins)".to_string() },
        ];

        let _: bool = self.call("setMyCommands", &SetMyCommandsRequest { commands }).await?;

        tracing::info!("Registered bot commands with Telegram");
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str, parse_mode: Option<&str>) -> Result<String, BotError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: &'a str,
            text: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            parse_mode: Option<&'a str>,
        }

        let result: MessageResult = self
            .call("sendMessage", &SendMessageRequest { chat_id, text, parse_mode })
            .await?;

        Ok(result.message_id.to_string())
    }
}

#[async_trait]
impl Bot for TelegramAdapter {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError> {
        tracing::debug!("Sending to {}: {}", chat_id, text);
        self.send_text(chat_id, text, None).await
    }

    async fn send_html(&self, chat_id: &str, text: &str) -> Result<String, BotError> {
        tracing::debug!("Sending HTML to {}: {}", chat_id, text);
        self.send_text(chat_id, text, Some("HTML")).await
    }

    async fn send_with_keyboard(&self, chat_id: &str, text: &str, buttons: Vec<Vec<KeyboardButton>>) -> Result<String, BotError> {
        tracing::debug!("Sending with keyboard to {}: {}", chat_id, text);

        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: &'a str,
            text: &'a str,
            reply_markup: InlineKeyboardMarkup,
        }

        let inline_keyboard = buttons.into_iter().map(|row| {
            row.into_iter().map(|btn| InlineKeyboardButton {
                text: btn.text,
                callback_data: btn.callback_data,
            }).collect()
        }).collect();

        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup: InlineKeyboardMarkup { inline_keyboard },
        };

        let result: MessageResult = self.call("sendMessage", &request).await?;
        Ok(result.message_id.to_string())
    }

    async fn send_document(&self, chat_id: &str, document: Document, caption: Option<&str>) -> Result<String, BotError> {
        tracing::debug!("Sending document {} to {}", document.file_name, chat_id);

        let part = Part::bytes(document.bytes)
            .file_name(document.file_name)
            .mime_str("text/plain")
            .map_err(|e| BotError::Internal(e.to_string()))?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self.client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::Network(e.without_url().to_string()))?;

        let result: MessageResult = Self::unwrap_response("sendDocument", response).await?;
        Ok(result.message_id.to_string())
    }

    async fn send_dice(&self, chat_id: &str, emoji: &str) -> Result<String, BotError> {
        #[derive(Serialize)]
        struct SendDiceRequest<'a> {
            chat_id: &'a str,
            emoji: &'a str,
        }

        let result: MessageResult = self.call("sendDice", &SendDiceRequest { chat_id, emoji }).await?;
        Ok(result.message_id.to_string())
    }

    async fn remove_keyboard(&self, chat_id: &str, message_id: &str) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct EditReplyMarkupRequest<'a> {
            chat_id: &'a str,
            message_id: i64,
            reply_markup: InlineKeyboardMarkup,
        }

        let request = EditReplyMarkupRequest {
            chat_id,
            message_id: parse_message_id(message_id)?,
            reply_markup: InlineKeyboardMarkup { inline_keyboard: Vec::new() },
        };

        // Result is the edited Message (or `true` for inline messages)
        let _: serde_json::Value = self.call("editMessageReplyMarkup", &request).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct DeleteMessageRequest<'a> {
            chat_id: &'a str,
            message_id: i64,
        }

        let request = DeleteMessageRequest { chat_id, message_id: parse_message_id(message_id)? };
        let _: bool = self.call("deleteMessage", &request).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<(), BotError> {
        #[derive(Serialize)]
        struct AnswerRequest<'a> {
            callback_query_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            text: Option<&'a str>,
        }

        let _: bool = self
            .call("answerCallbackQuery", &AnswerRequest { callback_query_id: callback_id, text })
            .await?;
        Ok(())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Content;

    fn parser() -> MessageParser {
        MessageParser::new("prize_bot")
    }

    #[test]
    fn test_command_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "is_bot": false, "first_name": "Ann", "username": "ann"},
                "chat": {"id": 42, "type": "private"},
                "date": 0,
                "text": "/start ab12cd34"
            }
        })).unwrap();

        let msg = update.into_message(&parser()).unwrap();
        assert_eq!(msg.id, "5");
        assert_eq!(msg.chat_id, "42");
        assert_eq!(msg.sender.unwrap().username.as_deref(), Some("ann"));
        assert_eq!(msg.content, Content::Command {
            name: "start".to_string(),
            args: vec!["ab12cd34".to_string()],
        });
    }

    #[test]
    fn test_callback_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 7, "is_bot": false, "first_name": "Bo"},
                "message": {"message_id": 99, "chat": {"id": 7}, "date": 0, "text": "Welcome"},
                "chat_instance": "x",
                "data": "spin:ab12cd34"
            }
        })).unwrap();

        let msg = update.into_message(&parser()).unwrap();
        assert_eq!(msg.callback_id.as_deref(), Some("cb-1"));
        assert_eq!(msg.id, "99");
        assert_eq!(msg.chat_id, "7");
        assert_eq!(msg.content, Content::CallbackData("spin:ab12cd34".to_string()));
    }

    #[test]
    fn test_non_text_message_ignored() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 12,
            "message": {"message_id": 1, "chat": {"id": 1}, "date": 0}
        })).unwrap();
        assert!(update.into_message(&parser()).is_none());
    }

    #[test]
    fn test_next_offset() {
        let updates: Vec<Update> = serde_json::from_value(serde_json::json!([
            {"update_id": 3}, {"update_id": 9}, {"update_id": 4}
        ])).unwrap();
        assert_eq!(TelegramAdapter::get_next_offset(&updates), Some(10));
        assert_eq!(TelegramAdapter::get_next_offset(&[]), None);
    }

    #[test]
    fn test_error_envelope() {
        let data: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,"description":"Bad Request: message to delete not found"}"#,
        ).unwrap();
        assert!(!data.ok);
        assert!(data.result.is_none());
        assert_eq!(data.description.as_deref(), Some("Bad Request: message to delete not found"));
    }

    #[test]
    fn test_token_redaction() {
        let adapter = TelegramAdapter::new("123456:SECRET");
        assert!(adapter.describe().contains("123456:***"));
        assert!(!adapter.describe().contains("SECRET"));
    }

    #[test]
    fn test_token_redaction_without_separator() {
        assert_eq!(TelegramAdapter::new("абвгдежзий").redacted_token(), "абвгдежз");
        assert_eq!(TelegramAdapter::new("short").redacted_token(), "short");
        assert_eq!(TelegramAdapter::new("").redacted_token(), "");
    }
}
