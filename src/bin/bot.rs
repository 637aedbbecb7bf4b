//! Discord gateway entry point
//!
//! Configuration can come from:
//! - config.yaml (or the file named by CONFIG_FILE)
//! - Environment variables

use anyhow::{Context as _, Result};
use dotenvy::dotenv;
use log::{debug, error, info, warn};
use serenity::async_trait;
use serenity::builder::CreateComponents;
use serenity::http::Http;
use serenity::model::application::command::Command as ApplicationCommand;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::{Member, PartialGuild};
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};
use serenity::model::permissions::Permissions;
use serenity::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use concierge::commands::slash::create_commands;
use concierge::commands::{Button, CommandOption, Outbound, QueuedResponder, Reply};
use concierge::dispatcher::{ComponentEvent, MessageEvent, SlashCommandEvent};
use concierge::{
    register_builtin_commands, BotConfig, CommandRegistry, DiskSettingsStore, DispatchOutcome,
    Dispatcher, InboundEvent,
};

/// Where replies for one event are delivered
enum Target {
    Channel(ChannelId),
    Command(Box<ApplicationCommandInteraction>),
    Component(Box<MessageComponentInteraction>),
}

/// Handler for the bot's Discord events
struct Handler {
    bot_name: String,
    config: BotConfig,
    dispatcher: Arc<Dispatcher>,
    guild_id: Option<GuildId>,
    /// Filled in on Ready; 0 until then
    bot_user_id: AtomicU64,
}

impl Handler {
    fn new(config: BotConfig, dispatcher: Arc<Dispatcher>, guild_id: Option<GuildId>) -> Self {
        Handler {
            bot_name: config.name.clone(),
            config,
            dispatcher,
            guild_id,
            bot_user_id: AtomicU64::new(0),
        }
    }

    /// Run one dispatch on a blocking thread and drain its replies in the background
    async fn dispatch(&self, http: Arc<Http>, event: InboundEvent, target: Target) {
        let (responder, receiver) = QueuedResponder::channel();
        spawn_delivery(self.bot_name.clone(), http, target, receiver);

        let dispatcher = self.dispatcher.clone();
        let guild_id = event.guild_id();
        let result =
            tokio::task::spawn_blocking(move || dispatcher.dispatch(event, Arc::new(responder)))
                .await;

        match result {
            Ok(Ok(outcome @ DispatchOutcome::Ignored(_))) => {
                debug!("[{}] Guild {guild_id}: {outcome}", self.bot_name);
            }
            Ok(Ok(outcome)) => {
                info!("[{}] Guild {guild_id}: {outcome}", self.bot_name);
            }
            Ok(Err(e)) => {
                error!("[{}] Dispatch failed in guild {guild_id}: {e}", self.bot_name);
            }
            Err(e) => {
                error!("[{}] Dispatch task failed in guild {guild_id}: {e}", self.bot_name);
            }
        }
    }

    /// Permissions of the bot and of `member` at guild level
    async fn guild_permissions(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        member: UserId,
    ) -> serenity::Result<Option<(Permissions, Permissions)>> {
        let bot_id = self.bot_user_id.load(Ordering::Relaxed);
        if bot_id == 0 {
            return Ok(None);
        }

        let guild = guild_id.to_partial_guild(&ctx.http).await?;
        let bot_member = guild_id.member(ctx, UserId(bot_id)).await?;
        let author_member = guild_id.member(ctx, member).await?;

        Ok(Some((
            member_permissions(&guild, &bot_member),
            member_permissions(&guild, &author_member),
        )))
    }

    /// Resolve permissions for an event, logging failures
    async fn event_permissions(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Option<(Permissions, Permissions)> {
        match self.guild_permissions(ctx, guild_id, user_id).await {
            Ok(Some(permissions)) => Some(permissions),
            Ok(None) => {
                warn!("[{}] Ignoring event received before Ready", self.bot_name);
                None
            }
            Err(e) => {
                error!(
                    "[{}] Failed to resolve permissions in guild {guild_id}: {e}",
                    self.bot_name
                );
                None
            }
        }
    }

    async fn register_commands(&self, ctx: &Context) {
        let definitions = self.dispatcher.registry().interactive_definitions();
        let commands = create_commands(definitions, |name| self.config.allows_command(name));
        let count = commands.len();

        let result = match self.guild_id {
            Some(guild_id) => {
                info!(
                    "[{}] Development mode: Registering {count} commands for guild {guild_id}",
                    self.bot_name
                );
                guild_id
                    .set_application_commands(&ctx.http, |builder| {
                        builder.set_application_commands(commands)
                    })
                    .await
            }
            None => {
                info!(
                    "[{}] Production mode: Registering {count} commands globally",
                    self.bot_name
                );
                ApplicationCommand::set_global_application_commands(&ctx.http, |builder| {
                    builder.set_application_commands(commands)
                })
                .await
            }
        };

        match result {
            Ok(_) => info!("[{}] Successfully registered slash commands", self.bot_name),
            Err(e) => error!("[{}] Failed to register slash commands: {e}", self.bot_name),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let dispatcher = self.dispatcher.clone();
        let content = msg.content.clone();
        let candidate = tokio::task::spawn_blocking(move || {
            dispatcher.is_command_candidate(guild_id.0, &content)
        })
        .await;
        match candidate {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => return,
            Ok(Err(e)) => {
                error!("[{}] Failed to read prefix for guild {guild_id}: {e}", self.bot_name);
                return;
            }
            Err(e) => {
                error!("[{}] Prefix check task failed: {e}", self.bot_name);
                return;
            }
        }

        let Some((self_permissions, member_permissions)) = self
            .event_permissions(&ctx, guild_id, msg.author.id)
            .await
        else {
            return;
        };

        let event = MessageEvent {
            guild_id: guild_id.0,
            channel_id: msg.channel_id.0,
            author_id: msg.author.id.0,
            content: msg.content.clone(),
            mentions: msg.mentions.iter().map(|user| user.id.0).collect(),
            self_permissions,
            member_permissions,
        };
        self.dispatch(ctx.http.clone(), event.into(), Target::Channel(msg.channel_id))
            .await;
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            "[{}] {} is connected and ready!",
            self.bot_name, ready.user.name
        );
        info!("[{}] Connected to {} guilds", self.bot_name, ready.guilds.len());
        info!("[{}] Bot ID: {}", self.bot_name, ready.user.id);

        if let Some(shard) = ready.shard {
            info!("[{}] Shard: {}/{}", self.bot_name, shard[0] + 1, shard[1]);
        }

        self.bot_user_id.store(ready.user.id.0, Ordering::Relaxed);
        self.register_commands(&ctx).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => {
                let Some(guild_id) = command.guild_id else {
                    debug!("[{}] Ignoring slash command outside a guild", self.bot_name);
                    return;
                };

                let Some((self_permissions, member_permissions)) = self
                    .event_permissions(&ctx, guild_id, command.user.id)
                    .await
                else {
                    return;
                };

                let event = SlashCommandEvent {
                    guild_id: guild_id.0,
                    channel_id: command.channel_id.0,
                    user_id: command.user.id.0,
                    name: command.data.name.clone(),
                    options: command
                        .data
                        .options
                        .iter()
                        .filter_map(|option| {
                            option
                                .value
                                .clone()
                                .map(|value| CommandOption::new(option.name.clone(), value))
                        })
                        .collect(),
                    self_permissions,
                    member_permissions,
                };
                self.dispatch(
                    ctx.http.clone(),
                    event.into(),
                    Target::Command(Box::new(command)),
                )
                .await;
            }
            Interaction::MessageComponent(component) => {
                let Some(guild_id) = component.guild_id else {
                    debug!("[{}] Ignoring component outside a guild", self.bot_name);
                    return;
                };

                let Some((self_permissions, member_permissions)) = self
                    .event_permissions(&ctx, guild_id, component.user.id)
                    .await
                else {
                    return;
                };

                let event = ComponentEvent {
                    guild_id: guild_id.0,
                    channel_id: component.channel_id.0,
                    user_id: component.user.id.0,
                    custom_id: component.data.custom_id.clone(),
                    self_permissions,
                    member_permissions,
                };
                self.dispatch(
                    ctx.http.clone(),
                    event.into(),
                    Target::Component(Box::new(component)),
                )
                .await;
            }
            Interaction::Ping(_) => {
                info!("[{}] Ping interaction received", self.bot_name);
            }
            _ => {}
        }
    }
}

/// Guild-level permissions of a member, from the guild's roles
fn member_permissions(guild: &PartialGuild, member: &Member) -> Permissions {
    if member.user.id == guild.owner_id {
        return Permissions::all();
    }

    let everyone = guild
        .roles
        .get(&RoleId(guild.id.0))
        .map(|role| role.permissions)
        .unwrap_or_else(Permissions::empty);
    let permissions = member
        .roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .fold(everyone, |acc, role| acc | role.permissions);

    if permissions.administrator() {
        Permissions::all()
    } else {
        permissions
    }
}

// ============================================================================
// Reply delivery
// ============================================================================

fn spawn_delivery(
    bot_name: String,
    http: Arc<Http>,
    target: Target,
    mut receiver: UnboundedReceiver<Outbound>,
) {
    tokio::spawn(async move {
        let mut responded = false;
        while let Some(message) = receiver.recv().await {
            if let Err(e) = deliver(&http, &target, message, &mut responded).await {
                error!("[{}] Failed to deliver reply: {e}", bot_name);
            }
        }
    });
}

async fn deliver(
    http: &Http,
    target: &Target,
    message: Outbound,
    responded: &mut bool,
) -> serenity::Result<()> {
    match (target, message) {
        (Target::Channel(_), Outbound::Acknowledge) => {}
        (Target::Channel(channel_id), Outbound::Reply(reply)) => {
            channel_id
                .send_message(http, |m| {
                    m.content(&reply.content);
                    if !reply.buttons.is_empty() {
                        m.components(|c| add_buttons(c, &reply.buttons));
                    }
                    m
                })
                .await?;
        }
        (Target::Command(command), Outbound::Acknowledge) => {
            if !*responded {
                command.defer(http).await?;
                *responded = true;
            }
        }
        (Target::Command(command), Outbound::Reply(reply)) => {
            if *responded {
                command
                    .create_followup_message(http, |f| {
                        f.content(&reply.content).ephemeral(reply.ephemeral);
                        if !reply.buttons.is_empty() {
                            f.components(|c| add_buttons(c, &reply.buttons));
                        }
                        f
                    })
                    .await?;
            } else {
                command
                    .create_interaction_response(http, |r| {
                        r.kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|d| response_data(d, &reply))
                    })
                    .await?;
                *responded = true;
            }
        }
        (Target::Component(component), Outbound::Acknowledge) => {
            if !*responded {
                component.defer(http).await?;
                *responded = true;
            }
        }
        (Target::Component(component), Outbound::Reply(reply)) => {
            if *responded {
                component
                    .create_followup_message(http, |f| {
                        f.content(&reply.content).ephemeral(reply.ephemeral);
                        if !reply.buttons.is_empty() {
                            f.components(|c| add_buttons(c, &reply.buttons));
                        }
                        f
                    })
                    .await?;
            } else {
                component
                    .create_interaction_response(http, |r| {
                        r.kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|d| response_data(d, &reply))
                    })
                    .await?;
                *responded = true;
            }
        }
    }
    Ok(())
}

fn response_data<'a, 'b>(
    data: &'a mut serenity::builder::CreateInteractionResponseData<'b>,
    reply: &Reply,
) -> &'a mut serenity::builder::CreateInteractionResponseData<'b> {
    data.content(&reply.content).ephemeral(reply.ephemeral);
    if !reply.buttons.is_empty() {
        data.components(|c| add_buttons(c, &reply.buttons));
    }
    data
}

fn add_buttons<'a>(components: &'a mut CreateComponents, buttons: &[Button]) -> &'a mut CreateComponents {
    components.create_action_row(|row| {
        for button in buttons {
            row.create_button(|b| {
                b.custom_id(&button.custom_id)
                    .label(&button.label)
                    .style(ButtonStyle::Primary)
            });
        }
        row
    })
}

// ============================================================================
// Startup
// ============================================================================

/// Run the bot with retry logic
async fn run_bot(config: BotConfig, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let bot_name = config.name.clone();
    let max_retries = 5;
    let mut retry_count = 0;

    loop {
        info!("[{}] Starting bot (attempt {}/{})", bot_name, retry_count + 1, max_retries);

        match run_bot_inner(&config, dispatcher.clone()).await {
            Ok(()) => {
                info!("[{}] Bot exited normally", bot_name);
                break;
            }
            Err(e) => {
                retry_count += 1;
                if retry_count >= max_retries {
                    error!(
                        "[{}] Bot failed after {} retries: {}",
                        bot_name, max_retries, e
                    );
                    return Err(e);
                }

                let delay = Duration::from_secs(5 * retry_count as u64);
                warn!(
                    "[{}] Bot failed: {}. Retrying in {:?}...",
                    bot_name, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    Ok(())
}

/// Inner bot run function (single attempt)
async fn run_bot_inner(config: &BotConfig, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let bot_name = config.name.clone();
    let guild_id = config.dev_guild_id()?.map(GuildId);

    let handler = Handler::new(config.clone(), dispatcher, guild_id);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("[{}] Failed to create Discord client: {e}", bot_name);
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("[{}] Connecting to Discord gateway...", bot_name);

    // Blocks until disconnect
    client.start().await.map_err(|e| {
        error!("[{}] Gateway connection failed: {e}", bot_name);
        anyhow::anyhow!("Gateway connection failed: {}", e)
    })?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = BotConfig::auto_load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log_level),
    )
    .init();

    info!("Starting {} Discord bot...", config.name);

    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry).context("Failed to register commands")?;

    let store = Arc::new(DiskSettingsStore::with_ttl(&config.data_dir, config.cache_ttl()));
    info!(
        "Settings stored under {} (cache TTL {:?})",
        config.data_dir.display(),
        config.cache_ttl()
    );
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), store));

    tokio::select! {
        result = run_bot(config, dispatcher) => result,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
            Ok(())
        }
    }
}
