//! Platform-neutral inbound events, filled in by the gateway adapter

use crate::commands::CommandOption;
use serenity::model::permissions::Permissions;

/// A guild text message that may carry a prefixed command
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub content: String,
    /// Users mentioned in the message, in order
    pub mentions: Vec<u64>,
    pub self_permissions: Permissions,
    pub member_permissions: Permissions,
}

/// An interactive (slash) command invocation
#[derive(Debug, Clone)]
pub struct SlashCommandEvent {
    pub guild_id: u64,
    pub channel_id: u64,
    pub user_id: u64,
    pub name: String,
    pub options: Vec<CommandOption>,
    pub self_permissions: Permissions,
    pub member_permissions: Permissions,
}

/// A click on a button previously sent by the bot
#[derive(Debug, Clone)]
pub struct ComponentEvent {
    pub guild_id: u64,
    pub channel_id: u64,
    pub user_id: u64,
    /// Opaque id the component was created with
    pub custom_id: String,
    pub self_permissions: Permissions,
    pub member_permissions: Permissions,
}

#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(MessageEvent),
    SlashCommand(SlashCommandEvent),
    Component(ComponentEvent),
}

impl InboundEvent {
    pub fn guild_id(&self) -> u64 {
        match self {
            InboundEvent::Message(event) => event.guild_id,
            InboundEvent::SlashCommand(event) => event.guild_id,
            InboundEvent::Component(event) => event.guild_id,
        }
    }
}

impl From<MessageEvent> for InboundEvent {
    fn from(event: MessageEvent) -> Self {
        InboundEvent::Message(event)
    }
}

impl From<SlashCommandEvent> for InboundEvent {
    fn from(event: SlashCommandEvent) -> Self {
        InboundEvent::SlashCommand(event)
    }
}

impl From<ComponentEvent> for InboundEvent {
    fn from(event: ComponentEvent) -> Self {
        InboundEvent::Component(event)
    }
}
