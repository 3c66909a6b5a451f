//! Telegram channel — long-polls the Bot API for updates.
//!
//! Prompts and channel posts go out with `parse_mode: HTML`. If Telegram
//! refuses the markup the text is re-sent as plain text.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{
    Channel, IncomingMessage, MessageStream, Messenger, Publisher, ReplyMarkup,
};
use crate::error::ChannelError;
use crate::form::ChatTarget;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    /// Send a text message, HTML first with plain text fallback.
    /// Splits long messages; the reply markup rides on the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markup: &ReplyMarkup,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_markup = if i == last { markup } else { &ReplyMarkup::None };
            self.send_message_chunk(chat_id, chunk, chunk_markup).await?;
        }

        Ok(())
    }

    /// Send a single message chunk (≤4096 chars), HTML-first with fallback.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        markup: &ReplyMarkup,
    ) -> Result<(), ChannelError> {
        let mut html_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML"
        });
        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup_json) = reply_markup_json(markup) {
            html_body["reply_markup"] = markup_json.clone();
            plain_body["reply_markup"] = markup_json;
        }

        let html_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&html_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if html_resp.status().is_success() {
            return Ok(());
        }

        let html_status = html_resp.status();
        let html_err = html_resp.text().await.unwrap_or_default();
        tracing::warn!(
            status = ?html_status,
            error = %html_err,
            "Telegram sendMessage with HTML failed; retrying without parse_mode"
        );

        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!(
                    "sendMessage failed (html: {}, plain: {})",
                    html_status, plain_err
                ),
            });
        }

        Ok(())
    }
}

// ── Delivery traits ─────────────────────────────────────────────────

#[async_trait]
impl Messenger for TelegramChannel {
    async fn send_prompt(
        &self,
        target: &ChatTarget,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), ChannelError> {
        self.send_message(&target.chat_id, text, &markup).await
    }
}

#[async_trait]
impl Publisher for TelegramChannel {
    async fn publish(&self, target: &str, document: &str) -> Result<(), ChannelError> {
        self.send_message(target, document, &ReplyMarkup::None)
            .await
            .map_err(|e| ChannelError::PublishFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        tracing::info!(target = %target, "Telegram post published");
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(serde_json::Value::as_array)
                else {
                    tracing::warn!(response = %data, "Telegram getUpdates returned no result");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Turn one getUpdates entry into an incoming message.
///
/// Returns `None` for non-text updates and for senders outside the
/// allow-list.
fn parse_update(update: &serde_json::Value, allowed_users: &[String]) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;

    let from = message.get("from");
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(|u| u.as_str())
        .unwrap_or("unknown");
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string());

    // Check allowlist against both username and numeric ID
    let is_allowed = {
        let mut identities = vec![username];
        if let Some(ref id) = user_id {
            identities.push(id.as_str());
        }
        check_user_allowed(allowed_users, identities.iter().copied())
    };

    if !is_allowed {
        tracing::warn!(
            "Telegram: ignoring message from unauthorized user: \
             username={username}, user_id={}",
            user_id.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();

    let first_name = from
        .and_then(|f| f.get("first_name"))
        .and_then(|n| n.as_str())
        .unwrap_or(username);

    Some(
        IncomingMessage::new("telegram", user_id.as_deref().unwrap_or(username), text)
            .with_metadata(serde_json::json!({
                "chat_id": chat_id,
                "username": username,
            }))
            .with_user_name(first_name),
    )
}

/// Bot API `reply_markup` object for a prompt, if it needs one.
fn reply_markup_json(markup: &ReplyMarkup) -> Option<serde_json::Value> {
    match markup {
        ReplyMarkup::None => None,
        ReplyMarkup::Choices(choices) => {
            let row: Vec<serde_json::Value> = choices
                .iter()
                .map(|c| serde_json::json!({ "text": c }))
                .collect();
            Some(serde_json::json!({
                "keyboard": [row],
                "one_time_keyboard": true,
                "resize_keyboard": true
            }))
        }
        ReplyMarkup::ClearChoices => Some(serde_json::json!({ "remove_keyboard": true })),
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char
/// boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        // Find a good split point
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(allowed: &[&str]) -> TelegramChannel {
        TelegramChannel::new(
            SecretString::from("123:ABC".to_string()),
            allowed.iter().map(|s| s.to_string()).collect(),
        )
    }

    // ── Basic channel tests ─────────────────────────────────────────

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel(&["*"]).name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel(&[]).api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    // ── User allowlist tests ────────────────────────────────────────

    fn allowed(users: &[&str]) -> Vec<String> {
        users.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn telegram_user_allowed_wildcard() {
        assert!(check_user_allowed(&allowed(&["*"]), ["anyone"]));
    }

    #[test]
    fn telegram_user_allowed_specific() {
        let users = allowed(&["alice", "bob"]);
        assert!(check_user_allowed(&users, ["alice"]));
        assert!(!check_user_allowed(&users, ["eve"]));
    }

    #[test]
    fn telegram_user_denied_empty() {
        assert!(!check_user_allowed(&[], ["anyone"]));
    }

    #[test]
    fn telegram_user_exact_match_not_substring() {
        let users = allowed(&["alice"]);
        assert!(!check_user_allowed(&users, ["alice_bot"]));
        assert!(!check_user_allowed(&users, ["malice"]));
    }

    #[test]
    fn telegram_user_allowed_by_numeric_id_identity() {
        let users = allowed(&["123456789"]);
        assert!(check_user_allowed(&users, ["unknown", "123456789"]));
    }

    #[test]
    fn telegram_user_denied_when_none_of_identities_match() {
        let users = allowed(&["alice", "987654321"]);
        assert!(!check_user_allowed(&users, ["unknown", "123456789"]));
    }

    // ── Update parsing ──────────────────────────────────────────────

    fn update(text: Option<&str>, username: &str, id: i64) -> serde_json::Value {
        let mut message = serde_json::json!({
            "chat": { "id": 555 },
            "from": { "id": id, "username": username, "first_name": "Elio" }
        });
        if let Some(text) = text {
            message["text"] = serde_json::Value::String(text.to_string());
        }
        serde_json::json!({ "update_id": 1, "message": message })
    }

    #[test]
    fn parse_update_builds_incoming_message() {
        let msg = parse_update(&update(Some("/post"), "eliorpap", 42), &["*".to_string()]).unwrap();
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.content, "/post");
        assert_eq!(msg.user_name.as_deref(), Some("Elio"));
        assert_eq!(msg.reply_target(), ChatTarget::new("telegram", "555"));
        assert_eq!(msg.session_key(), "telegram:42");
    }

    #[test]
    fn parse_update_skips_non_text() {
        assert!(parse_update(&update(None, "eliorpap", 42), &["*".to_string()]).is_none());
    }

    #[test]
    fn parse_update_enforces_allowlist() {
        let allowed = vec!["alice".to_string()];
        assert!(parse_update(&update(Some("hi"), "eve", 7), &allowed).is_none());
        assert!(parse_update(&update(Some("hi"), "alice", 7), &allowed).is_some());
        assert!(parse_update(&update(Some("hi"), "eve", 7), &["7".to_string()]).is_some());
    }

    // ── Reply markup ────────────────────────────────────────────────

    #[test]
    fn reply_markup_choices_is_one_time_keyboard() {
        let json = reply_markup_json(&ReplyMarkup::Choices(vec!["Yes".into(), "No".into()]))
            .unwrap();
        assert_eq!(json["keyboard"][0][0]["text"], "Yes");
        assert_eq!(json["keyboard"][0][1]["text"], "No");
        assert_eq!(json["one_time_keyboard"], true);
    }

    #[test]
    fn reply_markup_clear_removes_keyboard() {
        let json = reply_markup_json(&ReplyMarkup::ClearChoices).unwrap();
        assert_eq!(json["remove_keyboard"], true);
        assert!(reply_markup_json(&ReplyMarkup::None).is_none());
    }

    // ── Network error tests (expected to fail with no server) ───────

    #[tokio::test]
    async fn telegram_publish_with_fake_token_fails() {
        let ch = TelegramChannel::new(SecretString::from("fake-token".to_string()), vec![]);
        let result = ch.publish("@channel", "<b>post</b>").await;
        assert!(matches!(result, Err(ChannelError::PublishFailed { .. })));
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // 'é' is two bytes; an odd limit lands mid-char.
        let msg = "é".repeat(10);
        let chunks = split_message(&msg, 5);
        assert!(chunks.iter().all(|c| c.len() <= 5));
        assert_eq!(chunks.concat(), msg);
    }
}
