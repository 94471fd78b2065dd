//! Discord gateway glue: serenity client setup, slash command registration,
//! and the mapping from raw interactions/messages to router events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serenity::all::{
    ActionRowComponent, ChannelId, ChannelType, Client, Command, CommandInteraction,
    CommandOptionType, ComponentInteraction, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
    CreateMessage, EditMessage, EventHandler, GatewayIntents, GuildId, Interaction, Message,
    MessageId, ModalInteraction, Permissions, Ready, ResolvedValue, UserId,
};
use serenity::http::{Http, HttpError};

use crate::config::Config;
use crate::db::Database;
use crate::router::{ChatGateway, EventContext, InboundEvent, ReplySink, Router};

use super::ui;
use super::util::{mentions_directly, strip_bot_mentions, welcome_channel_index};

/// Start the Discord listener. Runs until the gateway connection ends.
pub async fn start_discord_listener(
    config: &Config,
    db: Arc<Database>,
    router: Arc<Router>,
) -> Result<(), String> {
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let handler = Handler {
        router,
        db,
        dev_guild_id: config.dev_guild_id,
        bot_user_id: AtomicU64::new(0),
    };

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| format!("Failed to create Discord client: {}", e))?;

    log::info!("Discord: client created, connecting to gateway");

    client
        .start()
        .await
        .map_err(|e| format!("Discord client error: {}", e))
}

struct Handler {
    router: Arc<Router>,
    db: Arc<Database>,
    dev_guild_id: Option<u64>,
    /// Our own user id, learned from the ready event; used for mention
    /// detection before the cache would have it.
    bot_user_id: AtomicU64,
}

impl Handler {
    async fn register_commands(&self, ctx: &Context) {
        let commands = vec![
            CreateCommand::new("setup").description("Initial setup for the DeepSeek bot"),
            CreateCommand::new("model").description("Select which DeepSeek model to use"),
            CreateCommand::new("ask")
                .description("Ask DeepSeek a question")
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "message",
                        "The question to ask",
                    )
                    .required(true),
                ),
            CreateCommand::new("apikey").description("Change your DeepSeek API key"),
        ];

        let result = match self.dev_guild_id {
            Some(guild_id) => {
                log::info!("Registering commands to dev guild {}", guild_id);
                GuildId::new(guild_id).set_commands(&ctx.http, commands).await
            }
            None => {
                log::info!("Registering commands globally");
                Command::set_global_commands(&ctx.http, commands).await
            }
        };

        match result {
            Ok(registered) => log::info!("Registered {} slash commands", registered.len()),
            Err(e) => log::error!("Failed to register slash commands: {}", e),
        }
    }

    /// Best-effort welcome for guilds that have never completed setup.
    /// `welcome_sent` flips only on a confirmed successful send, so a failed
    /// delivery is retried on the next ready.
    async fn run_onboarding(&self, ctx: &Context, guild_id: GuildId) {
        let gid = guild_id.get();

        match self.db.welcome_sent(gid) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                log::error!("Failed to read welcome state for guild {}: {}", gid, e);
                return;
            }
        }
        if matches!(self.db.get_api_key(gid), Ok(Some(_))) {
            return;
        }

        let channels = match guild_id.channels(&ctx.http).await {
            Ok(channels) => channels,
            Err(e) => {
                log::warn!("Failed to list channels for guild {}: {}", gid, e);
                return;
            }
        };

        // No gateway cache: fetch the guild and our own member once to
        // compute per-channel permissions.
        let guild = match guild_id.to_partial_guild(&ctx.http).await {
            Ok(guild) => guild,
            Err(e) => {
                log::warn!("Failed to fetch guild {}: {}", gid, e);
                return;
            }
        };
        let bot_id = UserId::new(self.bot_user_id.load(Ordering::SeqCst));
        let me = match guild_id.member(&ctx.http, bot_id).await {
            Ok(member) => member,
            Err(e) => {
                log::warn!("Failed to fetch own member in guild {}: {}", gid, e);
                return;
            }
        };

        let mut text_channels: Vec<_> = channels
            .values()
            .filter(|c| c.kind == ChannelType::Text)
            .collect();
        text_channels.sort_by_key(|c| c.position);

        let candidates: Vec<(&str, bool)> = text_channels
            .iter()
            .map(|c| {
                let perms = guild.user_permissions_in(c, &me);
                let postable =
                    perms.contains(Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS);
                (c.name.as_str(), postable)
            })
            .collect();

        let Some(idx) = welcome_channel_index(&candidates) else {
            log::warn!(
                "Guild {} has no text channel the bot can post the welcome message in",
                gid
            );
            return;
        };
        let channel = text_channels[idx];

        match channel
            .id
            .send_message(&ctx.http, CreateMessage::new().embed(ui::welcome_embed()))
            .await
        {
            Ok(_) => {
                log::info!("Sent welcome message to #{} in guild {}", channel.name, gid);
                if let Err(e) = self.db.mark_welcome_sent(gid) {
                    log::error!("Failed to persist welcome state for guild {}: {}", gid, e);
                }
            }
            Err(e) => {
                log::warn!(
                    "Cannot send welcome message in #{} of guild {}: {}",
                    channel.name,
                    gid,
                    e
                );
            }
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        log::info!("Discord: connected as {}", ready.user.name);
        self.bot_user_id.store(ready.user.id.get(), Ordering::SeqCst);

        self.register_commands(&ctx).await;

        for guild in &ready.guilds {
            self.run_onboarding(&ctx, guild.id).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Ignore bots, including ourselves.
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let bot_id = self.bot_user_id.load(Ordering::SeqCst);
        // Detection runs on the raw body: reply-quoting adds us to the
        // gateway's mention list without a typed token and must not trigger.
        if bot_id == 0 || !mentions_directly(&msg.content, bot_id) {
            return;
        }

        let text = strip_bot_mentions(&msg.content, bot_id);
        let event_ctx = EventContext {
            guild_id: guild_id.get(),
            channel_id: msg.channel_id.get(),
        };
        let sink = MessageSink::new(&ctx.http, &msg);
        let gateway = HttpGateway { http: &ctx.http };

        self.router
            .dispatch(InboundEvent::MentionTrigger { text }, &event_ctx, &sink, &gateway)
            .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(cmd) => {
                let Some(guild_id) = cmd.guild_id else {
                    return;
                };
                let event = match cmd.data.name.as_str() {
                    "setup" => InboundEvent::Setup,
                    "model" => InboundEvent::SelectModel,
                    "ask" => InboundEvent::Ask {
                        text: ask_message_option(&cmd),
                    },
                    "apikey" => InboundEvent::ChangeCredential,
                    other => {
                        log::warn!("Unknown slash command: {}", other);
                        return;
                    }
                };

                let event_ctx = EventContext {
                    guild_id: guild_id.get(),
                    channel_id: cmd.channel_id.get(),
                };
                let target = AnyInteraction::Command(&cmd);
                let sink = InteractionSink { http: &ctx.http, target };
                let gateway = InteractionGateway { http: &ctx.http, target };
                self.router.dispatch(event, &event_ctx, &sink, &gateway).await;
            }
            Interaction::Component(comp) => {
                let Some(guild_id) = comp.guild_id else {
                    return;
                };
                let custom_id = comp.data.custom_id.as_str();
                let event = if custom_id == ui::SETUP_APIKEY_BUTTON {
                    InboundEvent::ChangeCredential
                } else if custom_id == ui::SETUP_MODEL_BUTTON {
                    InboundEvent::SelectModel
                } else if let Some(model) = custom_id.strip_prefix(ui::MODEL_BUTTON_PREFIX) {
                    InboundEvent::ChooseModel {
                        model: model.to_string(),
                        message_id: comp.message.id.get(),
                    }
                } else {
                    log::warn!("Unknown component custom_id: {}", custom_id);
                    return;
                };

                let event_ctx = EventContext {
                    guild_id: guild_id.get(),
                    channel_id: comp.channel_id.get(),
                };
                let target = AnyInteraction::Component(&comp);
                let sink = InteractionSink { http: &ctx.http, target };
                let gateway = InteractionGateway { http: &ctx.http, target };
                self.router.dispatch(event, &event_ctx, &sink, &gateway).await;
            }
            Interaction::Modal(modal) => {
                let Some(guild_id) = modal.guild_id else {
                    return;
                };
                if modal.data.custom_id != ui::CREDENTIAL_MODAL {
                    return;
                }

                let event = InboundEvent::SubmitCredential {
                    credential: credential_input(&modal),
                };
                let event_ctx = EventContext {
                    guild_id: guild_id.get(),
                    channel_id: modal.channel_id.get(),
                };
                let target = AnyInteraction::Modal(&modal);
                let sink = InteractionSink { http: &ctx.http, target };
                let gateway = InteractionGateway { http: &ctx.http, target };
                self.router.dispatch(event, &event_ctx, &sink, &gateway).await;
            }
            _ => {}
        }
    }
}

fn ask_message_option(cmd: &CommandInteraction) -> String {
    for option in cmd.data.options() {
        if option.name == "message" {
            if let ResolvedValue::String(text) = option.value {
                return text.to_string();
            }
        }
    }
    String::new()
}

fn credential_input(modal: &ModalInteraction) -> String {
    for row in &modal.data.components {
        for component in &row.components {
            if let ActionRowComponent::InputText(input) = component {
                if input.custom_id == ui::CREDENTIAL_INPUT {
                    return input.value.clone().unwrap_or_default().trim().to_string();
                }
            }
        }
    }
    String::new()
}

/// The three interaction flavors share identical response plumbing.
#[derive(Clone, Copy)]
enum AnyInteraction<'a> {
    Command(&'a CommandInteraction),
    Component(&'a ComponentInteraction),
    Modal(&'a ModalInteraction),
}

impl AnyInteraction<'_> {
    async fn create_response(
        &self,
        http: &Http,
        response: CreateInteractionResponse,
    ) -> serenity::Result<()> {
        match self {
            AnyInteraction::Command(cmd) => cmd.create_response(http, response).await,
            AnyInteraction::Component(comp) => comp.create_response(http, response).await,
            AnyInteraction::Modal(modal) => modal.create_response(http, response).await,
        }
    }

    async fn create_followup(
        &self,
        http: &Http,
        followup: CreateInteractionResponseFollowup,
    ) -> serenity::Result<Message> {
        match self {
            AnyInteraction::Command(cmd) => cmd.create_followup(http, followup).await,
            AnyInteraction::Component(comp) => comp.create_followup(http, followup).await,
            AnyInteraction::Modal(modal) => modal.create_followup(http, followup).await,
        }
    }

    async fn get_response(&self, http: &Http) -> serenity::Result<Message> {
        match self {
            AnyInteraction::Command(cmd) => cmd.get_response(http).await,
            AnyInteraction::Component(comp) => comp.get_response(http).await,
            AnyInteraction::Modal(modal) => modal.get_response(http).await,
        }
    }
}

struct InteractionSink<'a> {
    http: &'a Http,
    target: AnyInteraction<'a>,
}

#[async_trait]
impl ReplySink for InteractionSink<'_> {
    async fn reply(&self, text: &str) -> Result<(), String> {
        self.target
            .create_response(
                self.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new().content(text),
                ),
            )
            .await
            .map_err(|e| e.to_string())
    }

    async fn reply_private(&self, text: &str) -> Result<(), String> {
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new().content(text).ephemeral(true),
        );
        // The interaction may already be acknowledged (e.g. deferred);
        // fall back to an ephemeral followup.
        if self.target.create_response(self.http, response).await.is_err() {
            self.target
                .create_followup(
                    self.http,
                    CreateInteractionResponseFollowup::new().content(text).ephemeral(true),
                )
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    async fn defer(&self) -> Result<(), String> {
        self.target
            .create_response(
                self.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await
            .map_err(|e| e.to_string())
    }

    async fn followup(&self, text: &str) -> Result<(), String> {
        self.target
            .create_followup(
                self.http,
                CreateInteractionResponseFollowup::new().content(text),
            )
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn reply_setup(&self, has_credential: bool) -> Result<(), String> {
        self.target
            .create_response(
                self.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .embed(ui::setup_embed())
                        .components(ui::setup_components(has_credential)),
                ),
            )
            .await
            .map_err(|e| e.to_string())
    }

    async fn prompt_credential(&self) -> Result<(), String> {
        self.target
            .create_response(
                self.http,
                CreateInteractionResponse::Modal(ui::credential_modal()),
            )
            .await
            .map_err(|e| e.to_string())
    }
}

/// Gateway for interaction-scoped dispatches: a fresh selector goes out as
/// the interaction's own response; edits and deletes go through plain HTTP.
struct InteractionGateway<'a> {
    http: &'a Http,
    target: AnyInteraction<'a>,
}

#[async_trait]
impl ChatGateway for InteractionGateway<'_> {
    async fn create_selector(&self, _channel_id: u64, current_model: &str) -> Result<u64, String> {
        self.target
            .create_response(
                self.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .embed(ui::selector_embed())
                        .components(ui::selector_components(current_model)),
                ),
            )
            .await
            .map_err(|e| e.to_string())?;

        let message = self
            .target
            .get_response(self.http)
            .await
            .map_err(|e| format!("failed to fetch selector message id: {}", e))?;
        Ok(message.id.get())
    }

    async fn update_selector(
        &self,
        channel_id: u64,
        message_id: u64,
        model: &str,
    ) -> Result<(), String> {
        edit_selector(self.http, channel_id, message_id, model).await
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<bool, String> {
        delete_message(self.http, channel_id, message_id).await
    }
}

/// Gateway for message-scoped dispatches (no interaction to respond to).
struct HttpGateway<'a> {
    http: &'a Http,
}

#[async_trait]
impl ChatGateway for HttpGateway<'_> {
    async fn create_selector(&self, channel_id: u64, current_model: &str) -> Result<u64, String> {
        let message = ChannelId::new(channel_id)
            .send_message(
                self.http,
                CreateMessage::new()
                    .embed(ui::selector_embed())
                    .components(ui::selector_components(current_model)),
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(message.id.get())
    }

    async fn update_selector(
        &self,
        channel_id: u64,
        message_id: u64,
        model: &str,
    ) -> Result<(), String> {
        edit_selector(self.http, channel_id, message_id, model).await
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<bool, String> {
        delete_message(self.http, channel_id, message_id).await
    }
}

async fn edit_selector(
    http: &Http,
    channel_id: u64,
    message_id: u64,
    model: &str,
) -> Result<(), String> {
    ChannelId::new(channel_id)
        .edit_message(
            http,
            MessageId::new(message_id),
            EditMessage::new()
                .embed(ui::selector_embed())
                .components(ui::selector_components(model)),
        )
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// `Ok(false)` when the message was already gone.
async fn delete_message(http: &Http, channel_id: u64, message_id: u64) -> Result<bool, String> {
    match ChannelId::new(channel_id)
        .delete_message(http, MessageId::new(message_id))
        .await
    {
        Ok(()) => Ok(true),
        Err(serenity::Error::Http(HttpError::UnsuccessfulRequest(response)))
            if response.status_code.as_u16() == 404 =>
        {
            Ok(false)
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Reply channel for plain-message events. There is no defer/ephemeral at
/// this transport level: deferring shows a typing indicator, and private
/// replies degrade to regular ones.
struct MessageSink<'a> {
    http: &'a Http,
    message: &'a Message,
    replied: AtomicBool,
}

impl<'a> MessageSink<'a> {
    fn new(http: &'a Http, message: &'a Message) -> Self {
        MessageSink {
            http,
            message,
            replied: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ReplySink for MessageSink<'_> {
    async fn reply(&self, text: &str) -> Result<(), String> {
        self.message
            .reply(self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn reply_private(&self, text: &str) -> Result<(), String> {
        self.reply(text).await
    }

    async fn defer(&self) -> Result<(), String> {
        self.message
            .channel_id
            .broadcast_typing(self.http)
            .await
            .map_err(|e| e.to_string())
    }

    async fn followup(&self, text: &str) -> Result<(), String> {
        // First chunk replies to the triggering message; the rest follow as
        // ordinary sends so the reply chain stays readable.
        if !self.replied.swap(true, Ordering::SeqCst) {
            self.reply(text).await
        } else {
            self.message
                .channel_id
                .say(self.http, text)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
    }

    async fn reply_setup(&self, _has_credential: bool) -> Result<(), String> {
        Err("setup UI is not available on plain messages".to_string())
    }

    async fn prompt_credential(&self) -> Result<(), String> {
        Err("credential form is not available on plain messages".to_string())
    }
}
