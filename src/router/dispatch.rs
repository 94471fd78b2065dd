//! Command router: maps one inbound event to exactly one handler, enforcing
//! the setup-before-use precondition. Every error is caught here and turned
//! into a user-visible reply; nothing propagates out of `dispatch`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::{CompletionApi, KEY_TEST_PROMPT};
use crate::channels::util::split_response;
use crate::config::DEFAULT_MODEL;
use crate::db::Database;
use crate::error::RelayError;

use super::events::{EventContext, InboundEvent};
use super::selector::{ChatGateway, SelectorManager};

/// Reply text for a mention that carried no content besides the mention.
const EMPTY_MENTION_PROMPT: &str =
    "You rang? Mention me with a question, or use /ask, and I'll answer.";

/// Reply channel of the event currently being handled. A slash command, a
/// button press and a plain message all answer differently at the transport
/// level; the router only distinguishes public, private and deferred sends.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Public reply on the event's channel.
    async fn reply(&self, text: &str) -> Result<(), String>;

    /// Reply visible to the acting user only.
    async fn reply_private(&self, text: &str) -> Result<(), String>;

    /// Acknowledge now, answer later. Must be called before any slow work.
    async fn defer(&self) -> Result<(), String>;

    /// Follow-up to a deferred acknowledgment; ordered per call.
    async fn followup(&self, text: &str) -> Result<(), String>;

    /// Render the onboarding UI. `has_credential` drives which affordances
    /// are enabled.
    async fn reply_setup(&self, has_credential: bool) -> Result<(), String>;

    /// Present the credential entry form.
    async fn prompt_credential(&self) -> Result<(), String>;
}

pub struct Router {
    db: Arc<Database>,
    completion: Arc<dyn CompletionApi>,
    selector: SelectorManager,
}

impl Router {
    pub fn new(db: Arc<Database>, completion: Arc<dyn CompletionApi>) -> Self {
        let selector = SelectorManager::new(db.clone());
        Router {
            db,
            completion,
            selector,
        }
    }

    /// Handle one inbound event. Infallible from the caller's point of view:
    /// failures become replies (or, failing that, log lines).
    pub async fn dispatch(
        &self,
        event: InboundEvent,
        ctx: &EventContext,
        sink: &dyn ReplySink,
        gateway: &dyn ChatGateway,
    ) {
        let kind = event.kind();
        log::info!("Dispatching {} event for guild {}", kind, ctx.guild_id);

        if let Err(e) = self.handle(event, ctx, sink, gateway).await {
            log::error!("{} handler failed for guild {}: {}", kind, ctx.guild_id, e);
            if let Err(send_err) = sink.reply_private(&e.user_message()).await {
                log::error!("Failed to deliver error reply: {}", send_err);
            }
        }
    }

    async fn handle(
        &self,
        event: InboundEvent,
        ctx: &EventContext,
        sink: &dyn ReplySink,
        gateway: &dyn ChatGateway,
    ) -> Result<(), RelayError> {
        match event {
            InboundEvent::Setup => self.handle_setup(ctx, sink).await,
            InboundEvent::SelectModel => self.handle_select_model(ctx, sink, gateway).await,
            InboundEvent::Ask { text } => self.handle_ask(ctx, sink, &text, true).await,
            InboundEvent::MentionTrigger { text } => {
                self.handle_ask(ctx, sink, &text, false).await
            }
            InboundEvent::ChangeCredential => {
                sink.prompt_credential()
                    .await
                    .map_err(RelayError::Unknown)?;
                Ok(())
            }
            InboundEvent::SubmitCredential { credential } => {
                self.handle_submit_credential(ctx, sink, &credential).await
            }
            InboundEvent::ChooseModel { model, message_id } => {
                self.selector
                    .choose(gateway, sink, ctx.guild_id, ctx.channel_id, message_id, &model)
                    .await
            }
        }
    }

    async fn handle_setup(
        &self,
        ctx: &EventContext,
        sink: &dyn ReplySink,
    ) -> Result<(), RelayError> {
        let has_credential = self.db.get_api_key(ctx.guild_id)?.is_some();
        sink.reply_setup(has_credential)
            .await
            .map_err(RelayError::Unknown)?;
        Ok(())
    }

    async fn handle_select_model(
        &self,
        ctx: &EventContext,
        sink: &dyn ReplySink,
        gateway: &dyn ChatGateway,
    ) -> Result<(), RelayError> {
        if self.db.get_api_key(ctx.guild_id)?.is_none() {
            let _ = sink.reply_private(&RelayError::SetupRequired.user_message()).await;
            return Ok(());
        }
        self.selector
            .render(gateway, ctx.guild_id, ctx.channel_id)
            .await
    }

    /// Shared flow for `/ask` and direct mentions. `ephemeral_precondition`
    /// controls whether the setup-required reply goes to the actor only
    /// (slash command) or to the channel (plain message). The setup check
    /// runs before anything else; a bare mention only gets the generic
    /// prompt once the guild has a credential.
    async fn handle_ask(
        &self,
        ctx: &EventContext,
        sink: &dyn ReplySink,
        text: &str,
        ephemeral_precondition: bool,
    ) -> Result<(), RelayError> {
        let Some(api_key) = self.db.get_api_key(ctx.guild_id)? else {
            let message = RelayError::SetupRequired.user_message();
            let _ = if ephemeral_precondition {
                sink.reply_private(&message).await
            } else {
                sink.reply(&message).await
            };
            return Ok(());
        };

        if text.is_empty() {
            if let Err(e) = sink.reply(EMPTY_MENTION_PROMPT).await {
                log::warn!("Failed to send mention prompt for guild {}: {}", ctx.guild_id, e);
            }
            return Ok(());
        }

        // The completion call is the dominant latency source; acknowledge
        // before issuing it.
        if let Err(e) = sink.defer().await {
            log::warn!("Failed to defer reply for guild {}: {}", ctx.guild_id, e);
        }

        let model = self.effective_model(ctx.guild_id)?;

        match self.completion.complete(&api_key, &model, text).await {
            Ok(answer) => {
                for chunk in split_response(&answer) {
                    if let Err(e) = sink.followup(&chunk).await {
                        log::error!("Failed to send response chunk for guild {}: {}", ctx.guild_id, e);
                    }
                }
            }
            Err(e) => {
                let relay_err = RelayError::from(e);
                log::warn!("Completion failed for guild {}: {}", ctx.guild_id, relay_err);
                if let Err(send_err) = sink.followup(&relay_err.user_message()).await {
                    log::error!("Failed to deliver completion error reply: {}", send_err);
                }
            }
        }
        Ok(())
    }

    /// Test-before-commit: the candidate key is validated with one completion
    /// round-trip and persisted only when the service accepts it. An invalid
    /// key is never stored.
    async fn handle_submit_credential(
        &self,
        ctx: &EventContext,
        sink: &dyn ReplySink,
        credential: &str,
    ) -> Result<(), RelayError> {
        match self
            .completion
            .complete(credential, DEFAULT_MODEL, KEY_TEST_PROMPT)
            .await
        {
            Ok(_) => {
                self.db.set_api_key(ctx.guild_id, credential)?;
                if self.db.get_model_if_set(ctx.guild_id)?.is_none() {
                    self.db.set_model(ctx.guild_id, DEFAULT_MODEL)?;
                }
                let _ = sink.reply_private("API key has been set successfully!").await;
            }
            Err(e) => {
                let relay_err = RelayError::from(e);
                log::warn!("API key validation failed for guild {}: {}", ctx.guild_id, relay_err);
                let _ = sink
                    .reply_private(&format!("Error testing API key: {}", relay_err.user_message()))
                    .await;
            }
        }
        Ok(())
    }

    /// Stored model, or the baseline default — persisting the default when
    /// the guild never picked one, so later reads agree with what was used.
    fn effective_model(&self, guild_id: u64) -> Result<String, RelayError> {
        match self.db.get_model_if_set(guild_id)? {
            Some(model) => Ok(model),
            None => {
                self.db.set_model(guild_id, DEFAULT_MODEL)?;
                Ok(DEFAULT_MODEL.to_string())
            }
        }
    }
}
