use super::token::ComponentToken;
use crate::settings::{Entity, SettingsStore, StoreResult};
use log::warn;
use serde_json::Value;
use serenity::model::permissions::Permissions;
use std::sync::Arc;
use tokio::sync::mpsc;

// ============================================================================
// Outbound replies
// ============================================================================

/// Clickable button attached to a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
}

impl Button {
    pub fn new(token: &ComponentToken, label: impl Into<String>) -> Self {
        Button {
            custom_id: token.to_string(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Only visible to the invoker. Ignored for plain channel messages.
    pub ephemeral: bool,
    pub buttons: Vec<Button>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Reply {
            content: content.into(),
            ephemeral: false,
            buttons: Vec::new(),
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Reply {
            ephemeral: true,
            ..Reply::text(content)
        }
    }

    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Tell the platform the interaction was received
    Acknowledge,
    Reply(Reply),
}

/// Reply capability handed to a dispatch. Implementations must not block.
pub trait Responder: Send + Sync {
    fn acknowledge(&self);
    fn send(&self, reply: Reply);
}

/// Responder that enqueues onto an unbounded channel drained elsewhere
#[derive(Debug, Clone)]
pub struct QueuedResponder {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl QueuedResponder {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (QueuedResponder { sender }, receiver)
    }

    fn enqueue(&self, message: Outbound) {
        if let Err(e) = self.sender.send(message) {
            warn!("Dropping outbound message, delivery queue is closed: {e}");
        }
    }
}

impl Responder for QueuedResponder {
    fn acknowledge(&self) {
        self.enqueue(Outbound::Acknowledge);
    }

    fn send(&self, reply: Reply) {
        self.enqueue(Outbound::Reply(reply));
    }
}

// ============================================================================
// Invocation context
// ============================================================================

/// Named option of an interactive command as delivered by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOption {
    pub name: String,
    pub value: Value,
}

impl CommandOption {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        CommandOption {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// How the command was reached
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Text {
        args: Vec<String>,
        mentions: Vec<u64>,
    },
    Interactive {
        options: Vec<CommandOption>,
    },
    Component {
        token: ComponentToken,
    },
}

/// Everything a handler sees for one event
pub struct CommandContext {
    pub guild_id: u64,
    pub channel_id: u64,
    pub user_id: u64,
    /// What the bot itself may do in this guild
    pub self_permissions: Permissions,
    /// What the invoking member may do in this guild
    pub member_permissions: Permissions,
    pub invocation: Invocation,
    store: Arc<dyn SettingsStore>,
    responder: Arc<dyn Responder>,
}

impl CommandContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        guild_id: u64,
        channel_id: u64,
        user_id: u64,
        self_permissions: Permissions,
        member_permissions: Permissions,
        invocation: Invocation,
        store: Arc<dyn SettingsStore>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        CommandContext {
            guild_id,
            channel_id,
            user_id,
            self_permissions,
            member_permissions,
            invocation,
            store,
            responder,
        }
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn community(&self) -> Entity {
        Entity::community(self.guild_id)
    }

    pub fn user(&self) -> Entity {
        Entity::user(self.user_id)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.invocation, Invocation::Text { .. })
    }

    /// Whitespace-separated arguments of a text command
    pub fn args(&self) -> &[String] {
        match &self.invocation {
            Invocation::Text { args, .. } => args.as_slice(),
            _ => &[],
        }
    }

    /// Users mentioned in a text command
    pub fn mentions(&self) -> &[u64] {
        match &self.invocation {
            Invocation::Text { mentions, .. } => mentions.as_slice(),
            _ => &[],
        }
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        match &self.invocation {
            Invocation::Interactive { options } => options
                .iter()
                .find(|option| option.name == name)
                .map(|option| &option.value),
            _ => None,
        }
    }

    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.option(name).and_then(Value::as_str)
    }

    pub fn option_bool(&self, name: &str) -> Option<bool> {
        self.option(name).and_then(Value::as_bool)
    }

    /// User options arrive as snowflake strings
    pub fn option_user(&self, name: &str) -> Option<u64> {
        match self.option(name)? {
            Value::String(id) => id.parse().ok(),
            Value::Number(id) => id.as_u64(),
            _ => None,
        }
    }

    pub fn send(&self, reply: Reply) {
        self.responder.send(reply);
    }

    pub fn reply(&self, content: impl Into<String>) {
        self.send(Reply::text(content));
    }

    /// Ephemeral where the platform supports it, a normal reply otherwise
    pub fn reply_private(&self, content: impl Into<String>) {
        if self.is_text() {
            self.reply(content);
        } else {
            self.send(Reply::ephemeral(content));
        }
    }

    /// Prefix to show in usage hints for this invocation style
    pub fn usage_prefix(&self) -> StoreResult<String> {
        if self.is_text() {
            self.store.prefix(self.guild_id)
        } else {
            Ok("/".to_string())
        }
    }
}
