use std::sync::Arc;

use clubhouse_link::bot::Bot;
use clubhouse_link::channels::{Channel, CliChannel, TelegramChannel};
use clubhouse_link::config::BotConfig;
use clubhouse_link::conversation::ConversationManager;
use clubhouse_link::platform::ClubhouseClient;
use clubhouse_link::prompts::DefaultPrompts;
use clubhouse_link::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export MY_CLUBHOUSE_USER_ID=<clubhouse user id to follow>");
        std::process::exit(1);
    });

    eprintln!("🔗 Clubhouse Link v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Clubhouse API: {}", config.api_url);
    eprintln!("   Default region: {}", config.flow.region);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());
    match db.count_profiles().await {
        Ok(count) => eprintln!("   Linked profiles: {count}"),
        Err(e) => tracing::warn!("Could not count profiles: {e}"),
    }

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match config.telegram_token {
        Some(token) => {
            let telegram = TelegramChannel::new(token, config.allowed_users.clone());
            telegram.health_check().await?;
            eprintln!("   Channel: telegram");
            Arc::new(telegram)
        }
        None => {
            eprintln!("   Channel: cli (set TELEGRAM_BOT_TOKEN to use Telegram)");
            eprintln!("   Type /start and press Enter.\n");
            Arc::new(CliChannel::new())
        }
    };

    let manager = Arc::new(ConversationManager::new(
        Arc::new(ClubhouseClient::new(config.api_url)),
        db,
        Arc::new(DefaultPrompts::default()),
        config.flow,
    ));

    Bot::new(channel, manager).run().await?;
    Ok(())
}
