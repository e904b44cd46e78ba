//! Roulette flow: invite generation, link redemption and the prize spin

use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::application::errors::{BotError, CommandError};
use crate::domain::entities::token::{self, SPIN_PREFIX};
use crate::domain::entities::{Content, Message, Prize, TokenStatus, User};
use crate::domain::traits::{Bot, Document, KeyboardButton, PrizeInventory, TokenStore};
use crate::infrastructure::config::{Config, MessagesConfig};

/// File name of the generated links document
const LINKS_FILE: &str = "links.txt";

/// Slot machine dice emoji
const SLOT_EMOJI: &str = "🎰";

/// Attempts at topping up a batch after token collisions
const GENERATE_ROUNDS: usize = 5;

/// Tunables for the roulette flow
#[derive(Debug, Clone)]
pub struct RouletteSettings {
    pub admin_ids: Vec<i64>,
    pub spin_delay: Duration,
    pub max_generate: usize,
    pub messages: MessagesConfig,
}

impl RouletteSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            admin_ids: config.bot.admin_ids.clone(),
            spin_delay: Duration::from_millis(config.bot.spin_delay_ms),
            max_generate: config.bot.max_generate,
            messages: config.messages.clone(),
        }
    }
}

/// Outcome of a spin once the token is claimed
enum SpinOutcome {
    Won(Prize),
    OutOfPrizes,
}

/// Handles every update the bot reacts to
pub struct RouletteService {
    bot: Arc<dyn Bot>,
    tokens: Arc<dyn TokenStore>,
    prizes: Arc<dyn PrizeInventory>,
    settings: RouletteSettings,
    /// Serializes read-pick-record so two spins never share the last unit
    draw_lock: Mutex<()>,
}

impl RouletteService {
    pub fn new(
        bot: Arc<dyn Bot>,
        tokens: Arc<dyn TokenStore>,
        prizes: Arc<dyn PrizeInventory>,
        settings: RouletteSettings,
    ) -> Self {
        Self { bot, tokens, prizes, settings, draw_lock: Mutex::new(()) }
    }

    /// Route one incoming message
    pub async fn handle(&self, message: Message) -> Result<(), BotError> {
        match &message.content {
            Content::Command { name, args } => match name.as_str() {
                "generate" => self.generate(&message, args).await,
                "start" => self.start(&message, args.first().map(String::as_str)).await,
                other => {
                    tracing::debug!("Ignoring command /{}", other);
                    Ok(())
                }
            },
            Content::CallbackData(data) => match data.strip_prefix(SPIN_PREFIX) {
                Some(token) => self.spin(&message, token).await,
                None => {
                    // Unknown buttons still get answered so the client stops spinning
                    if let Some(callback_id) = &message.callback_id {
                        self.bot.answer_callback(callback_id, None).await?;
                    }
                    Ok(())
                }
            },
            Content::Text(_) | Content::Empty => Ok(()),
        }
    }

    fn is_admin(&self, user: Option<&User>) -> bool {
        user.and_then(User::numeric_id)
            .map_or(false, |id| self.settings.admin_ids.contains(&id))
    }

    /// `/generate <N>` argument, bounded by the configured maximum
    fn parse_count(&self, args: &[String]) -> Result<usize, CommandError> {
        let raw = args.first()
            .ok_or_else(|| CommandError::InvalidArgs("missing count".to_string()))?;
        let count: usize = raw.parse()
            .map_err(|_| CommandError::InvalidArgs(format!("not a number: {}", raw)))?;
        if count == 0 || count > self.settings.max_generate {
            return Err(CommandError::InvalidArgs(format!(
                "count must be between 1 and {}", self.settings.max_generate
            )));
        }
        Ok(count)
    }

    /// Admin only: mint `N` tokens and send their deep links as a file
    pub async fn generate(&self, message: &Message, args: &[String]) -> Result<(), BotError> {
        if !self.is_admin(message.sender.as_ref()) {
            let err = CommandError::PermissionDenied;
            tracing::debug!("/generate from {:?}: {}", message.sender.as_ref().map(|u| &u.id), err);
            return Ok(());
        }

        let count = match self.parse_count(args) {
            Ok(count) => count,
            Err(e) => {
                tracing::debug!("/generate rejected: {}", e);
                self.bot.send_message(&message.chat_id, &self.settings.messages.generate_usage).await?;
                return Ok(());
            }
        };

        let mut issued: Vec<String> = Vec::with_capacity(count);
        for _ in 0..GENERATE_ROUNDS {
            let missing = count - issued.len();
            if missing == 0 {
                break;
            }
            let mut batch: Vec<String> = (0..missing).map(|_| token::generate_token()).collect();
            batch.sort();
            batch.dedup();
            issued.extend(self.tokens.add_tokens(&batch).await?);
        }
        if issued.len() < count {
            tracing::warn!("Generated {} of {} requested tokens", issued.len(), count);
        }

        let username = self.bot.bot_info().username;
        let links: Vec<String> = issued.iter()
            .map(|t| token::deep_link(&username, t))
            .collect();

        let caption = self.settings.messages.generated.replace("{count}", &issued.len().to_string());
        let document = Document::new(LINKS_FILE, links.join("\n"));
        self.bot.send_document(&message.chat_id, document, Some(&caption)).await?;

        tracing::info!("Generated {} invite links", issued.len());
        Ok(())
    }

    /// `/start <token>`: offer the spin button for a live token
    pub async fn start(&self, message: &Message, payload: Option<&str>) -> Result<(), BotError> {
        let messages = &self.settings.messages;
        let Some(payload) = payload else {
            self.bot.send_message(&message.chat_id, &messages.link_required).await?;
            return Ok(());
        };

        let status = if token::is_valid_payload(payload) {
            self.tokens.status(payload).await?
        } else {
            None
        };

        if status == Some(TokenStatus::Active) {
            let button = KeyboardButton::new(&messages.spin_button)
                .with_callback(token::spin_callback(payload));
            self.bot.send_with_keyboard(&message.chat_id, &messages.welcome, vec![vec![button]]).await?;
        } else {
            self.bot.send_message(&message.chat_id, &messages.link_invalid).await?;
        }
        Ok(())
    }

    /// Spin button: claim the token, animate, draw a prize and record it
    pub async fn spin(&self, message: &Message, token: &str) -> Result<(), BotError> {
        let messages = &self.settings.messages;
        let callback_id = message.callback_id.as_deref().unwrap_or_default();
        let Some(user) = message.sender.as_ref() else {
            return Ok(());
        };

        if !token::is_valid_payload(token) || !self.tokens.claim(token).await? {
            self.bot.answer_callback(callback_id, Some(&messages.spin_inactive)).await?;
            if !message.id.is_empty() {
                if let Err(e) = self.bot.delete_message(&message.chat_id, &message.id).await {
                    tracing::warn!("Failed to delete stale spin message: {}", e);
                }
            }
            return Ok(());
        }

        tracing::info!("User {} ({}) spins token {}", user, user.id, token);

        if let Err(e) = self.bot.answer_callback(callback_id, None).await {
            tracing::warn!("Failed to answer callback: {}", e);
        }
        if !message.id.is_empty() {
            if let Err(e) = self.bot.remove_keyboard(&message.chat_id, &message.id).await {
                tracing::warn!("Failed to remove spin button: {}", e);
            }
        }

        match self.draw(user, token).await {
            Ok(SpinOutcome::Won(prize)) => {
                tracing::info!("User {} won '{}'", user.id, prize.name);
                let text = messages.prize_won.replace("{prize}", &escape_html(&prize.name));
                self.bot.send_html(&user.id, &text).await?;
            }
            Ok(SpinOutcome::OutOfPrizes) => {
                tracing::info!("No prizes left for user {}", user.id);
                self.bot.send_message(&user.id, &messages.out_of_prizes).await?;
            }
            Err(e) => {
                tracing::error!("Error: {}", e);
                if let Err(e) = self.tokens.release(token).await {
                    tracing::error!("Failed to release token {}: {}", token, e);
                }
                self.bot.send_message(&user.id, &messages.error).await?;
            }
        }
        Ok(())
    }

    /// Everything between the claim and the result message
    async fn draw(&self, user: &User, token: &str) -> Result<SpinOutcome, BotError> {
        self.bot.send_dice(&user.id, SLOT_EMOJI).await?;
        tokio::time::sleep(self.settings.spin_delay).await;

        let _guard = self.draw_lock.lock().await;
        let prizes = self.prizes.available_prizes().await?;
        let Some(prize) = pick_prize(&prizes) else {
            self.tokens.mark_used(token).await?;
            return Ok(SpinOutcome::OutOfPrizes);
        };

        self.prizes.record_winner(user, &prize).await?;
        self.tokens.mark_used(token).await?;
        Ok(SpinOutcome::Won(prize))
    }
}

/// Uniform choice among prizes with stock left
fn pick_prize(prizes: &[Prize]) -> Option<Prize> {
    let available: Vec<&Prize> = prizes.iter().filter(|p| p.is_available()).collect();
    available.choose(&mut rand::thread_rng()).map(|p| (*p).clone())
}

/// Escape text for Telegram's HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
