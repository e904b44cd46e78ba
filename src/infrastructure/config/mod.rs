//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub sheets: SheetsConfig,
    pub health: HealthConfig,
    pub launcher: LauncherConfig,
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    pub token: Option<String>,
    /// Telegram user ids allowed to run /generate
    pub admin_ids: Vec<i64>,
    /// Long polling timeout for getUpdates
    pub poll_timeout_secs: i64,
    /// Pause between the slot animation and the result
    pub spin_delay_ms: u64,
    /// Upper bound for /generate <N>
    pub max_generate: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub database: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SheetsConfig {
    pub sheet_id: Option<String>,
    /// Service account key file
    pub credentials: PathBuf,
    pub prizes_worksheet: String,
    pub winners_worksheet: String,
    pub columns: SheetColumns,
}

/// Header names of the prizes worksheet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SheetColumns {
    pub name: String,
    pub limit: String,
    pub issued: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LauncherConfig {
    /// Where the hosting platform mounts the service account key
    pub secrets_path: PathBuf,
}

/// User-facing texts. `{count}` and `{prize}` are substituted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MessagesConfig {
    pub generate_usage: String,
    pub generated: String,
    pub link_required: String,
    pub welcome: String,
    pub spin_button: String,
    pub link_invalid: String,
    pub spin_inactive: String,
    pub out_of_prizes: String,
    pub prize_won: String,
    pub error: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "roulette-bot".to_string(),
            token: None,
            admin_ids: Vec::new(),
            poll_timeout_secs: 30,
            spin_delay_ms: 2500,
            max_generate: 1000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("roulette.db"),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            credentials: PathBuf::from("service_account.json"),
            prizes_worksheet: "Prizes".to_string(),
            winners_worksheet: "Winners".to_string(),
            columns: SheetColumns::default(),
        }
    }
}

impl Default for SheetColumns {
    fn default() -> Self {
        Self {
            name: "Название приза".to_string(),
            limit: "Лимит".to_string(),
            issued: "Выдано".to_string(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            secrets_path: PathBuf::from("/etc/secrets/service_account.json"),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            generate_usage: "Использование: /generate <N>".to_string(),
            generated: "Сгенерировано {count}.".to_string(),
            link_required: "Нужна ссылка.".to_string(),
            welcome: "Добро пожаловать!".to_string(),
            spin_button: "🎰 Испытать удачу! 🎰".to_string(),
            link_invalid: "Ссылка недействительна или уже использована.".to_string(),
            spin_inactive: "Уже неактивно.".to_string(),
            out_of_prizes: "Призы закончились! 😔".to_string(),
            prize_won: "🎉 Приз: <b>{prize}</b>".to_string(),
            error: "Ошибка.".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Config file (if present) with `.env` and process environment applied on top
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env loaded: {}", e);
        }

        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.bot.token = Some(token);
        }

        if let Some(sheet_id) = lookup("SHEET_ID").filter(|s| !s.is_empty()) {
            self.sheets.sheet_id = Some(sheet_id);
        }

        if let Some(ids) = lookup("ADMIN_IDS") {
            self.bot.admin_ids = parse_admin_ids(&ids)?;
        }

        if let Some(port) = lookup("PORT") {
            self.health.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("PORT={}", port)))?;
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            self.storage.database = PathBuf::from(path);
        }

        if let Some(path) = lookup("CREDENTIALS_PATH") {
            self.sheets.credentials = PathBuf::from(path);
        }

        self.apply_secrets_path(&lookup);

        Ok(())
    }

    fn apply_secrets_path<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SECRETS_PATH").filter(|p| !p.is_empty()) {
            self.launcher.secrets_path = PathBuf::from(path);
        }
    }

    /// Defaults for `launch` when the full config is unusable. The secrets
    /// path override is independent of the broken fields, so it still applies.
    pub fn launch_fallback<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_secrets_path(&lookup);
        config
    }

    /// Check the fields `run` cannot do without
    pub fn validate_for_run(&self) -> Result<(), ConfigError> {
        if self.bot.token.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("bot.token (or BOT_TOKEN)".to_string()));
        }
        if self.sheets.sheet_id.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingField("sheets.sheet-id (or SHEET_ID)".to_string()));
        }
        if self.bot.max_generate == 0 {
            return Err(ConfigError::InvalidValue("bot.max-generate must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Parse a comma separated id list, ignoring blank entries
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ConfigError::InvalidValue(format!("admin id '{}'", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_admin_ids("").unwrap(), Vec::<i64>::new());
        assert_eq!(parse_admin_ids("5,,").unwrap(), vec![5]);
        assert!(parse_admin_ids("1,abc").is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "bot:\n  admin-ids: [10, 20]\n  spin-delay-ms: 0\nhealth:\n  port: 9000\n";
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.bot.admin_ids, vec![10, 20]);
        assert_eq!(config.bot.spin_delay_ms, 0);
        assert_eq!(config.bot.max_generate, 1000);
        assert_eq!(config.health.port, 9000);
        assert_eq!(config.health.host, "0.0.0.0");
        assert_eq!(config.sheets.prizes_worksheet, "Prizes");
        assert_eq!(config.messages, MessagesConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BOT_TOKEN", "123:abc"),
            ("SHEET_ID", "sheet"),
            ("ADMIN_IDS", "7,8"),
            ("PORT", "10000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.bot.token.as_deref(), Some("123:abc"));
        assert_eq!(config.sheets.sheet_id.as_deref(), Some("sheet"));
        assert_eq!(config.bot.admin_ids, vec![7, 8]);
        assert_eq!(config.health.port, 10000);
        assert!(config.validate_for_run().is_ok());
    }

    #[test]
    fn test_bad_port_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|k| (k == "PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_launch_fallback_keeps_secrets_path() {
        let env: HashMap<&str, &str> = [
            ("PORT", "not-a-port"),
            ("SECRETS_PATH", "/run/secrets/key.json"),
        ]
        .into_iter()
        .collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        assert!(Config::default().apply_env(lookup).is_err());

        let config = Config::launch_fallback(lookup);
        assert_eq!(config.launcher.secrets_path, PathBuf::from("/run/secrets/key.json"));
        assert_eq!(config.health.port, 8080);

        let config = Config::launch_fallback(|_| None);
        assert_eq!(config.launcher.secrets_path, PathBuf::from("/etc/secrets/service_account.json"));
    }

    #[test]
    fn test_validate_requires_token_and_sheet() {
        let mut config = Config::default();
        assert!(matches!(config.validate_for_run(), Err(ConfigError::MissingField(_))));

        config.bot.token = Some("t".to_string());
        assert!(matches!(config.validate_for_run(), Err(ConfigError::MissingField(_))));

        config.sheets.sheet_id = Some("s".to_string());
        assert!(config.validate_for_run().is_ok());
    }

    #[test]
    fn test_default_config_serializes() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("secrets-path: /etc/secrets/service_account.json"));
        let back = Config::from_yaml(&yaml).unwrap();
        assert_eq!(back.sheets.columns, SheetColumns::default());
    }
}
