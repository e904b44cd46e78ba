use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

mod domain;
mod application;
mod infrastructure;

use application::errors::{BotError, StorageError};
use application::messaging::MessageParser;
use application::services::{RouletteService, RouletteSettings};
use domain::entities::TokenStatus;
use domain::traits::Bot;
use infrastructure::adapters::telegram::TelegramAdapter;
use infrastructure::config::Config;
use infrastructure::database::Database;
use infrastructure::health::HealthServer;
use infrastructure::launcher;
use infrastructure::sheets::GoogleSheetsInventory;

#[derive(Parser)]
#[command(name = "roulette-bot")]
#[command(about = "Telegram prize roulette bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: String,

    /// Bot token (overrides config)
    #[arg(short, long, global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Container entrypoint: copy mounted credentials, then start the bot
    Launch {
        /// Credentials file to copy into the working directory
        #[arg(long)]
        secrets_path: Option<PathBuf>,

        /// Command to run instead of `roulette-bot run`
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => match run_bot(&cli.config, cli.token) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Launch { secrets_path, command } => {
            let code = launch(&cli.config, cli.token, secrets_path, command);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Commands::Version => {
            println!("roulette-bot v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => init_config(),
    }
}

fn launch(config_path: &str, token: Option<String>, secrets_path: Option<PathBuf>, argv: Vec<String>) -> i32 {
    // A broken config must not keep the bot from starting; `run` reports it
    let config = Config::resolve(config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::launch_fallback(|key| std::env::var(key).ok())
    });
    let secrets_path = secrets_path.unwrap_or(config.launcher.secrets_path);

    let mut default_args = vec!["--config".to_string(), config_path.to_string()];
    if let Some(token) = token {
        default_args.extend(["--token".to_string(), token]);
    }
    default_args.push("run".to_string());

    match launcher::entrypoint(&argv, &default_args) {
        Ok(command) => launcher::launch(&secrets_path, command),
        Err(e) => {
            tracing::error!("{}", e);
            launcher::EXIT_NOT_STARTED
        }
    }
}

fn run_bot(config_path: &str, token_override: Option<String>) -> Result<(), BotError> {
    let mut config = Config::resolve(config_path)?;
    if let Some(token) = token_override {
        config.bot.token = Some(token);
    }
    config.validate_for_run()?;

    tracing::info!("Starting {}", config.bot.name);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))?;
    rt.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), BotError> {
    // Initialize database
    let db = Database::new(&config.storage.database).map_err(StorageError::from)?;
    tracing::info!("Database initialized at {}", config.storage.database.display());

    let recovered = db.recover_pending()?;
    if recovered > 0 {
        tracing::warn!("Re-activated {} tokens left pending by an interrupted spin", recovered);
    }
    tracing::info!("{} active invite tokens", db.count_by_status(TokenStatus::Active)?);

    let sheet_id = config.sheets.sheet_id.clone().unwrap_or_default();
    let inventory = GoogleSheetsInventory::new(sheet_id, &config.sheets);
    if !inventory.credentials_present() {
        tracing::error!(
            "Credentials file {} not found! Check the secret files provided by the host.",
            config.sheets.credentials.display()
        );
    }

    let mut adapter = TelegramAdapter::new(config.bot.token.clone().unwrap_or_default());
    adapter.fetch_bot_info().await?;
    tracing::info!("Bot started: {} {}", adapter.bot_info().name, adapter.describe());

    if let Err(e) = adapter.register_commands().await {
        tracing::warn!("Failed to register commands: {}", e);
    }

    let offset = match adapter.skip_pending_updates().await {
        Ok(offset) => offset,
        Err(e) => {
            tracing::warn!("Failed to skip pending updates: {}", e);
            0
        }
    };

    let bot = Arc::new(adapter);
    let parser = MessageParser::new(bot.bot_info().username);
    let service = Arc::new(RouletteService::new(
        bot.clone(),
        Arc::new(db),
        Arc::new(inventory),
        RouletteSettings::from_config(&config),
    ));

    if config.health.enabled {
        let addr = format!("{}:{}", config.health.host, config.health.port);
        let server = HealthServer::bind(&addr)
            .await
            .map_err(|e| BotError::Internal(format!("Health server on {}: {}", addr, e)))?;
        tracing::info!("Web server started on port {}", config.health.port);
        tokio::spawn(server.serve());
    }

    tokio::select! {
        _ = poll_updates(bot, service, parser, offset, config.bot.poll_timeout_secs) => {}
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, stopping...");
        }
    }

    Ok(())
}

async fn poll_updates(
    bot: Arc<TelegramAdapter>,
    service: Arc<RouletteService>,
    parser: MessageParser,
    mut offset: i64,
    timeout_seconds: i64,
) {
    tracing::info!("Starting message loop...");

    loop {
        match bot.get_updates(offset, timeout_seconds).await {
            Ok(updates) => {
                if !updates.is_empty() {
                    tracing::info!("Received {} updates", updates.len());
                }

                // Update offset
                if let Some(next) = TelegramAdapter::get_next_offset(&updates) {
                    offset = next;
                }

                for update in updates {
                    let Some(message) = update.into_message(&parser) else {
                        continue;
                    };
                    tracing::debug!("Update in chat {} at {}", message.chat_id, message.timestamp);

                    // Spins sleep through the animation; don't hold up other users
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        if let Err(e) = service.handle(message).await {
                            tracing::error!("Failed to handle update: {}", e);
                        }
                    });
                }
            }
            Err(e) => {
                tracing::error!("Failed to get updates: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Ctrl+C, or SIGTERM from the container runtime
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn init_config() -> ExitCode {
    match serde_yaml::to_string(&Config::default()) {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to render config: {}", e);
            ExitCode::FAILURE
        }
    }
}
