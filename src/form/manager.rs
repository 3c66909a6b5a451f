//! FormManager — drives one conversation through the field flow.
//!
//! The manager holds only immutable, shareable parts (registry, document
//! builder, delivery handles). Every operation receives the conversation
//! it mutates, so conversations never share state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channels::{Messenger, Publisher, ReplyMarkup};
use crate::error::FlowError;

use super::document::DocumentBuilder;
use super::fields::FieldRegistry;
use super::model::Conversation;
use super::prompts;
use super::state::{ConfirmChoice, ConversationStatus, FlowStep, StepKey};

/// Coordinates validation, transitions, rendering and delivery.
pub struct FormManager {
    registry: Arc<FieldRegistry>,
    builder: DocumentBuilder,
    messenger: Arc<dyn Messenger>,
    publisher: Arc<dyn Publisher>,
    /// Channel id posts are published to.
    publish_target: String,
}

impl FormManager {
    pub fn new(
        registry: Arc<FieldRegistry>,
        builder: DocumentBuilder,
        messenger: Arc<dyn Messenger>,
        publisher: Arc<dyn Publisher>,
        publish_target: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            builder,
            messenger,
            publisher,
            publish_target: publish_target.into(),
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// What the conversation is currently waiting for, if anything.
    pub fn current_key(&self, conversation: &Conversation) -> Option<StepKey> {
        if conversation.is_terminal() {
            return None;
        }
        match conversation.step {
            FlowStep::Start => None,
            FlowStep::Field(i) => self.registry.field_at(i).map(|f| StepKey::Field(f.key)),
            FlowStep::Confirmation => Some(StepKey::Confirmation),
        }
    }

    /// Send the instructions, move to the first field and ask it.
    pub async fn start(&self, conversation: &mut Conversation) -> Result<StepKey, FlowError> {
        if conversation.is_terminal() || conversation.step != FlowStep::Start {
            return Err(invalid(conversation, "start"));
        }

        self.send(conversation, prompts::INTRO, ReplyMarkup::ClearChoices)
            .await?;

        let first = FlowStep::Start
            .next(self.registry.len())
            .ok_or_else(|| invalid(conversation, "start"))?;
        conversation.step = first;
        conversation.touch();

        info!(
            conversation_id = %conversation.id,
            user = %conversation.display_name(),
            "Post conversation started"
        );

        self.prompt_current(conversation).await
    }

    /// Validate a reply to the current field.
    ///
    /// Rejected replies re-send the same question and leave the pointer
    /// where it is; there is no retry limit. Accepted replies are stored
    /// and the next step is asked. Reaching the end sends the rendered post
    /// with the Yes/No choice.
    pub async fn advance(
        &self,
        conversation: &mut Conversation,
        raw: &str,
    ) -> Result<StepKey, FlowError> {
        let FlowStep::Field(index) = conversation.step else {
            return Err(invalid(conversation, "advance"));
        };
        if conversation.is_terminal() {
            return Err(invalid(conversation, "advance"));
        }
        let field = self
            .registry
            .field_at(index)
            .ok_or_else(|| invalid(conversation, "advance"))?;

        conversation.touch();

        if !field.validate(raw) {
            debug!(
                conversation_id = %conversation.id,
                field = %field.key,
                "Answer rejected, asking again"
            );
            self.send(conversation, &field.question(), ReplyMarkup::None)
                .await?;
            return Ok(StepKey::Field(field.key));
        }

        info!(
            conversation_id = %conversation.id,
            user = %conversation.display_name(),
            field = %field.key,
            value = %raw,
            "Answer accepted"
        );
        conversation.answers.insert(field.key, raw.to_string());

        let next = conversation
            .step
            .next(self.registry.len())
            .ok_or_else(|| invalid(conversation, "advance"))?;
        conversation.step = next;

        self.prompt_current(conversation).await
    }

    /// Re-send whatever the current step asks, unchanged. Counts as
    /// activity for idle expiry.
    pub async fn reprompt(&self, conversation: &mut Conversation) -> Result<StepKey, FlowError> {
        if conversation.is_terminal() || conversation.step == FlowStep::Start {
            return Err(invalid(conversation, "reprompt"));
        }
        conversation.touch();
        self.prompt_current(conversation).await
    }

    /// Resolve the confirmation step.
    ///
    /// Accept publishes the post first and only then marks the conversation
    /// confirmed, so a failed publish leaves it at confirmation and returns
    /// the delivery error. Reject discards the answers.
    pub async fn confirm(
        &self,
        conversation: &mut Conversation,
        choice: ConfirmChoice,
    ) -> Result<ConversationStatus, FlowError> {
        if conversation.is_terminal() || conversation.step != FlowStep::Confirmation {
            return Err(invalid(conversation, "confirm"));
        }
        conversation.touch();

        match choice {
            ConfirmChoice::Accept => {
                let document = self.builder.render(conversation)?;
                if let Err(e) = self.publisher.publish(&self.publish_target, &document).await {
                    warn!(
                        conversation_id = %conversation.id,
                        target = %self.publish_target,
                        error = %e,
                        "Publishing post failed"
                    );
                    return Err(FlowError::Delivery(e));
                }
                conversation.status = ConversationStatus::Confirmed;
                info!(
                    conversation_id = %conversation.id,
                    user = %conversation.display_name(),
                    target = %self.publish_target,
                    "Post published"
                );
                self.send(conversation, prompts::PUBLISHED, ReplyMarkup::ClearChoices)
                    .await?;
            }
            ConfirmChoice::Reject => {
                conversation.status = ConversationStatus::Cancelled;
                conversation.answers.clear();
                info!(
                    conversation_id = %conversation.id,
                    user = %conversation.display_name(),
                    "Post rejected at confirmation"
                );
                self.send(conversation, prompts::DISCARDED, ReplyMarkup::ClearChoices)
                    .await?;
            }
        }

        Ok(conversation.status)
    }

    /// Abandon the conversation from any non-terminal step.
    pub async fn cancel(&self, conversation: &mut Conversation) -> Result<(), FlowError> {
        self.cancel_with(conversation, prompts::FAREWELL).await
    }

    /// Cancel with a custom goodbye (used by idle expiry).
    pub async fn cancel_with(
        &self,
        conversation: &mut Conversation,
        farewell: &str,
    ) -> Result<(), FlowError> {
        if conversation.is_terminal() {
            return Err(invalid(conversation, "cancel"));
        }
        conversation.status = ConversationStatus::Cancelled;
        conversation.answers.clear();
        conversation.touch();

        info!(
            conversation_id = %conversation.id,
            user = %conversation.display_name(),
            step = %conversation.step,
            "Post conversation cancelled"
        );

        self.send(conversation, farewell, ReplyMarkup::ClearChoices)
            .await
    }

    async fn prompt_current(&self, conversation: &Conversation) -> Result<StepKey, FlowError> {
        match conversation.step {
            FlowStep::Start => Err(invalid(conversation, "prompt")),
            FlowStep::Field(i) => {
                let field = self
                    .registry
                    .field_at(i)
                    .ok_or_else(|| invalid(conversation, "prompt"))?;
                self.send(conversation, &field.question(), ReplyMarkup::None)
                    .await?;
                Ok(StepKey::Field(field.key))
            }
            FlowStep::Confirmation => {
                let document = self.builder.render(conversation)?;
                self.send(
                    conversation,
                    &prompts::confirmation_prompt(&document),
                    ReplyMarkup::Choices(prompts::confirmation_choices()),
                )
                .await?;
                Ok(StepKey::Confirmation)
            }
        }
    }

    async fn send(
        &self,
        conversation: &Conversation,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), FlowError> {
        self.messenger
            .send_prompt(&conversation.chat, text, markup)
            .await
            .map_err(FlowError::Delivery)
    }
}

fn invalid(conversation: &Conversation, operation: &'static str) -> FlowError {
    let step = if conversation.is_terminal() {
        conversation.status.to_string()
    } else {
        conversation.step.to_string()
    };
    FlowError::InvalidTransition {
        conversation: conversation.id.to_string(),
        operation,
        step,
    }
}
