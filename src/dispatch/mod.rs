//! Dispatcher — routes inbound messages to the post form.
//!
//! Messages are handled one at a time: load the sender's conversation,
//! apply one transition, store the result. Finished conversations are
//! removed from the store. The same loop periodically cancels
//! conversations that have been idle too long, so expiry never races a
//! user's reply.

pub mod commands;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, IncomingMessage, Messenger, ReplyMarkup};
use crate::error::{Error, FlowError};
use crate::form::{
    ChatTarget, ConfirmChoice, Conversation, FlowStep, FormManager, prompts,
};
use crate::store::ConversationStore;

pub use commands::{Command, Input};

/// How often idle conversations are swept.
pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Routes messages from a channel into per-session conversations.
pub struct Dispatcher {
    manager: FormManager,
    store: Arc<dyn ConversationStore>,
    messenger: Arc<dyn Messenger>,
    idle_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        manager: FormManager,
        store: Arc<dyn ConversationStore>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            manager,
            store,
            messenger,
            idle_timeout: None,
        }
    }

    /// Cancel conversations idle for longer than `timeout`. `None` disables.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn manager(&self) -> &FormManager {
        &self.manager
    }

    /// Consume a channel's messages until its stream ends.
    pub async fn run(&self, channel: &dyn Channel) -> Result<(), Error> {
        let mut messages = channel.start().await?;
        let mut sweep = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(channel = channel.name(), "Dispatcher running");

        loop {
            tokio::select! {
                next = messages.next() => {
                    let Some(msg) = next else {
                        break;
                    };
                    if let Err(e) = self.handle(&msg).await {
                        error!(
                            channel = %msg.channel,
                            user = %msg.user_id,
                            error = %e,
                            "Failed to handle message"
                        );
                    }
                }
                _ = sweep.tick(), if self.idle_timeout.is_some() => {
                    let expired = self.expire_idle(Utc::now()).await;
                    if expired > 0 {
                        info!(expired, "Expired idle conversations");
                    }
                }
            }
        }

        info!(channel = channel.name(), "Message stream ended");
        channel.shutdown().await?;
        Ok(())
    }

    /// Handle one inbound message.
    pub async fn handle(&self, msg: &IncomingMessage) -> Result<(), Error> {
        let session = msg.session_key();
        let target = msg.reply_target();
        let existing = self.store.load(&session).await?;

        debug!(session = %session, has_conversation = existing.is_some(), "Handling message");

        match Input::parse(&msg.content) {
            Input::Command(Command::Start) => self.reply(&target, prompts::GREETING).await,
            Input::Command(Command::Help) => self.reply(&target, prompts::HELP).await,
            Input::Command(Command::Post) => match existing {
                Some(mut conversation) => {
                    self.reply(&target, prompts::ALREADY_RUNNING).await?;
                    let result = self.manager.reprompt(&mut conversation).await;
                    self.persist(&conversation).await?;
                    result.map(|_| ()).map_err(Error::from)
                }
                None => {
                    let mut conversation = Conversation::new(session, target);
                    if let Some(ref name) = msg.user_name {
                        conversation = conversation.with_user_name(name.as_str());
                    }
                    // Claim a slot before talking to the user.
                    if let Err(e) = self.store.save(&conversation).await {
                        warn!(session = %conversation.session, error = %e, "Refusing new post");
                        return self.reply(&conversation.chat, prompts::BUSY).await;
                    }
                    let result = self.manager.start(&mut conversation).await;
                    self.persist(&conversation).await?;
                    result.map(|_| ()).map_err(Error::from)
                }
            },
            Input::Command(Command::Cancel) => match existing {
                Some(mut conversation) => {
                    let result = self.manager.cancel(&mut conversation).await;
                    self.store.remove(&conversation.session).await?;
                    result.map_err(Error::from)
                }
                None => self.reply(&target, prompts::NO_CONVERSATION).await,
            },
            Input::Command(Command::Unknown(name)) => {
                debug!(command = %name, "Unknown command");
                self.reply(&target, prompts::HELP).await
            }
            Input::Text(text) => match existing {
                Some(mut conversation) => self.answer(&mut conversation, text.trim()).await,
                None => self.reply(&target, prompts::NO_CONVERSATION).await,
            },
        }
    }

    /// Cancel and drop every conversation idle since before `now - timeout`.
    /// Returns how many were removed.
    pub async fn expire_idle(&self, now: DateTime<Utc>) -> usize {
        let Some(timeout) = self.idle_timeout else {
            return 0;
        };
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return 0;
        };

        let idle = match self.store.idle_since(now - timeout).await {
            Ok(idle) => idle,
            Err(e) => {
                warn!(error = %e, "Failed to list idle conversations");
                return 0;
            }
        };

        let mut expired = 0;
        for mut conversation in idle {
            if !conversation.is_terminal() {
                if let Err(e) = self
                    .manager
                    .cancel_with(&mut conversation, prompts::EXPIRED)
                    .await
                {
                    warn!(
                        conversation_id = %conversation.id,
                        error = %e,
                        "Failed to notify user of expired conversation"
                    );
                }
            }
            match self.store.remove(&conversation.session).await {
                Ok(_) => expired += 1,
                Err(e) => warn!(session = %conversation.session, error = %e, "Failed to remove expired conversation"),
            }
        }
        expired
    }

    /// Feed a non-command reply into the conversation.
    async fn answer(&self, conversation: &mut Conversation, text: &str) -> Result<(), Error> {
        let (result, publishing) = match conversation.step {
            FlowStep::Confirmation => match ConfirmChoice::parse(text) {
                Some(choice) => (
                    self.manager.confirm(conversation, choice).await.map(|_| ()),
                    choice == ConfirmChoice::Accept,
                ),
                None => (self.manager.reprompt(conversation).await.map(|_| ()), false),
            },
            _ => (self.manager.advance(conversation, text).await.map(|_| ()), false),
        };

        self.persist(conversation).await?;

        if publishing {
            // Accepted but still active means the publish itself failed.
            if matches!(result, Err(FlowError::Delivery(_))) && !conversation.is_terminal() {
                if let Err(e) = self
                    .messenger
                    .send_prompt(&conversation.chat, prompts::PUBLISH_FAILED, ReplyMarkup::None)
                    .await
                {
                    warn!(error = %e, "Failed to report publish failure to user");
                }
            }
        }

        result.map_err(Error::from)
    }

    /// Save a running conversation, drop a finished or never-started one.
    async fn persist(&self, conversation: &Conversation) -> Result<(), Error> {
        if conversation.is_terminal() || conversation.step == FlowStep::Start {
            self.store.remove(&conversation.session).await?;
        } else {
            self.store.save(conversation).await?;
        }
        Ok(())
    }

    async fn reply(&self, target: &ChatTarget, text: &str) -> Result<(), Error> {
        self.messenger
            .send_prompt(target, text, ReplyMarkup::None)
            .await
            .map_err(Error::from)
    }
}
