//! Configuration types.
//!
//! Everything comes from environment variables (optionally loaded from a
//! `.env` file by `main`). Parsing goes through a lookup function so it can
//! be tested without touching the process environment.

use std::time::Duration;

use chrono::Locale;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Default display locale for dates in posts.
pub const DEFAULT_LOCALE: &str = "en_US";

/// Default idle time before an unfinished conversation is discarded.
pub const DEFAULT_IDLE_TIMEOUT_MIN: u64 = 60;

/// Default cap on conversations in flight at once.
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

/// Publish target used when running on the CLI without `CHANNEL_ID`.
pub const CLI_PUBLISH_TARGET: &str = "cli";

/// Telegram Bot API settings.
#[derive(Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids allowed to talk to the bot; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Bot configuration.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram settings; `None` runs the bot on the CLI channel.
    pub telegram: Option<TelegramConfig>,
    /// Chat/channel id that confirmed posts are published to.
    pub publish_target: String,
    /// Locale for month names in post dates.
    pub locale: Locale,
    /// Unfinished conversations idle for this long are cancelled.
    /// `None` disables expiry.
    pub idle_timeout: Option<Duration>,
    /// Most conversations in flight at once. `None` is unbounded.
    pub max_conversations: Option<usize>,
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|token| TelegramConfig {
            bot_token: SecretString::from(token),
            allowed_users: parse_list(&get("TELEGRAM_ALLOWED_USERS").unwrap_or_else(|| "*".into())),
        });

        let publish_target = match (get("CHANNEL_ID"), telegram.is_some()) {
            (Some(id), _) => id,
            (None, false) => CLI_PUBLISH_TARGET.to_string(),
            (None, true) => {
                return Err(ConfigError::MissingRequired {
                    key: "CHANNEL_ID".into(),
                    hint: "Set it to the chat id or @username of the channel posts go to.".into(),
                });
            }
        };

        let locale_name = get("POST_LOCALE").unwrap_or_else(|| DEFAULT_LOCALE.into());
        let locale =
            Locale::try_from(locale_name.as_str()).map_err(|_| ConfigError::InvalidValue {
                key: "POST_LOCALE".into(),
                message: format!("unknown locale {locale_name:?} (expected e.g. en_US, fr_CH)"),
            })?;

        let idle_minutes = match get("POST_IDLE_TIMEOUT_MIN") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: "POST_IDLE_TIMEOUT_MIN".into(),
                message: e.to_string(),
            })?,
            None => DEFAULT_IDLE_TIMEOUT_MIN,
        };
        let idle_secs = idle_minutes
            .checked_mul(60)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "POST_IDLE_TIMEOUT_MIN".into(),
                message: format!("{idle_minutes} minutes is too large"),
            })?;
        let idle_timeout = (idle_secs > 0).then(|| Duration::from_secs(idle_secs));

        let max_conversations = match get("POST_MAX_CONVERSATIONS") {
            Some(raw) => raw.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
                key: "POST_MAX_CONVERSATIONS".into(),
                message: e.to_string(),
            })?,
            None => DEFAULT_MAX_CONVERSATIONS,
        };
        let max_conversations = (max_conversations > 0).then_some(max_conversations);

        Ok(Self {
            telegram,
            publish_target,
            locale,
            idle_timeout,
            max_conversations,
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
