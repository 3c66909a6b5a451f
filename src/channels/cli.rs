//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Every line typed is a message from one local user. Published posts are
//! printed between rulers instead of going to a real channel.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, IncomingMessage, MessageStream, Messenger, Publisher, ReplyMarkup};
use crate::error::ChannelError;
use crate::form::ChatTarget;

/// User id for every CLI message.
pub const CLI_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", CLI_USER, &line);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[async_trait]
impl Messenger for CliChannel {
    async fn send_prompt(
        &self,
        _target: &ChatTarget,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), ChannelError> {
        println!("\n{}", text);
        if let ReplyMarkup::Choices(choices) = markup {
            println!("[{}]", choices.join(" / "));
        }
        eprint!("> ");
        Ok(())
    }
}

#[async_trait]
impl Publisher for CliChannel {
    async fn publish(&self, target: &str, document: &str) -> Result<(), ChannelError> {
        println!("\n──── post to {target} ────\n{document}\n────────────────");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_channel_name() {
        assert_eq!(CliChannel::new().name(), "cli");
    }

    #[tokio::test]
    async fn cli_delivery_never_fails() {
        let cli = CliChannel::new();
        let target = ChatTarget::new("cli", CLI_USER);
        assert!(
            cli.send_prompt(&target, "Question?", ReplyMarkup::Choices(vec!["Yes".into()]))
                .await
                .is_ok()
        );
        assert!(cli.publish("cli", "<b>post</b>").await.is_ok());
        assert!(cli.health_check().await.is_ok());
    }
}
