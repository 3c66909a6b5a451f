use std::sync::Arc;

use event_post_bot::channels::{Channel, CliChannel, Messenger, Publisher, TelegramChannel};
use event_post_bot::config::BotConfig;
use event_post_bot::dispatch::Dispatcher;
use event_post_bot::form::{DocumentBuilder, FieldRegistry, FormManager};
use event_post_bot::store::{ConversationStore, MemoryConversationStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env next to the binary
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let BotConfig {
        telegram,
        publish_target,
        locale,
        idle_timeout,
        max_conversations,
    } = BotConfig::from_env()?;

    eprintln!("📮 Event Post Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Publishing to: {}", publish_target);
    eprintln!("   Date locale: {:?}", locale);
    match idle_timeout {
        Some(t) => eprintln!("   Idle expiry: {} min", t.as_secs() / 60),
        None => eprintln!("   Idle expiry: disabled"),
    }
    match max_conversations {
        Some(limit) => eprintln!("   Max conversations: {}", limit),
        None => eprintln!("   Max conversations: unbounded"),
    }

    let registry = Arc::new(FieldRegistry::event_post());
    let builder = DocumentBuilder::new(locale);
    let store = match max_conversations {
        Some(limit) => MemoryConversationStore::with_capacity(limit),
        None => MemoryConversationStore::new(),
    };
    let store: Arc<dyn ConversationStore> = Arc::new(store);

    let build = |messenger: Arc<dyn Messenger>, publisher: Arc<dyn Publisher>| {
        let manager = FormManager::new(
            Arc::clone(&registry),
            builder,
            Arc::clone(&messenger),
            publisher,
            publish_target.clone(),
        );
        Dispatcher::new(manager, Arc::clone(&store), messenger).with_idle_timeout(idle_timeout)
    };

    // Telegram when a bot token is configured, otherwise the local CLI
    match telegram {
        Some(tg) => {
            eprintln!(
                "   Telegram: enabled (allowed: {})\n",
                if tg.allowed_users.iter().any(|u| u == "*") {
                    "everyone".to_string()
                } else {
                    tg.allowed_users.join(", ")
                }
            );
            let channel = Arc::new(TelegramChannel::new(tg.bot_token, tg.allowed_users));
            if let Err(e) = channel.health_check().await {
                tracing::warn!(error = %e, "Telegram health check failed");
            }
            let messenger: Arc<dyn Messenger> = channel.clone();
            let publisher: Arc<dyn Publisher> = channel.clone();
            build(messenger, publisher).run(channel.as_ref()).await?;
        }
        None => {
            eprintln!("   Channel: cli (type /post to start, Ctrl-D to exit)\n");
            let channel = Arc::new(CliChannel::new());
            let messenger: Arc<dyn Messenger> = channel.clone();
            let publisher: Arc<dyn Publisher> = channel.clone();
            build(messenger, publisher).run(channel.as_ref()).await?;
        }
    }

    Ok(())
}
