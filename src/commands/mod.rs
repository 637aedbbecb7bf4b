//! Command model: what a command declares about itself and the contract its
//! handler satisfies. Registration lives in [`registry`], the bundled handlers
//! in [`builtin`].

pub mod builtin;
pub mod category;
pub mod context;
pub mod registry;
pub mod slash;
pub mod token;

pub use builtin::register_builtin_commands;
pub use category::{Category, UnknownCategory};
pub use context::{
    Button, CommandContext, CommandOption, Invocation, Outbound, QueuedResponder, Reply, Responder,
};
pub use registry::{CommandRegistry, Namespace, RegisteredCommand, RegistryError};
pub use token::ComponentToken;

use crate::settings::StoreError;
use serenity::model::permissions::Permissions;
use thiserror::Error;

// ============================================================================
// Descriptors
// ============================================================================

/// Static metadata every command hands to the registry
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub category: Category,
    /// Permissions the bot needs in the guild before the handler may run
    pub self_permissions: Permissions,
    /// Text-command invokes (without prefix)
    pub aliases: Vec<String>,
    pub interactive: Option<InteractiveDefinition>,
}

impl CommandDescriptor {
    pub fn new(category: Category, self_permissions: Permissions) -> Self {
        CommandDescriptor {
            category,
            self_permissions,
            aliases: Vec::new(),
            interactive: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn interactive(mut self, definition: InteractiveDefinition) -> Self {
        self.interactive = Some(definition);
        self
    }

    /// Name used in logs: the interactive name, else the first alias
    pub fn label(&self) -> &str {
        self.interactive
            .as_ref()
            .map(|definition| definition.name.as_str())
            .or_else(|| self.aliases.first().map(String::as_str))
            .unwrap_or("<unnamed>")
    }
}

/// Self-description of an interactive command, published to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveDefinition {
    pub name: String,
    pub description: String,
    pub options: Vec<OptionDefinition>,
    /// Who sees the command by default in the client
    pub default_member_permissions: Option<Permissions>,
}

impl InteractiveDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        InteractiveDefinition {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            default_member_permissions: None,
        }
    }

    pub fn option(mut self, option: OptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    pub fn default_member_permissions(mut self, permissions: Permissions) -> Self {
        self.default_member_permissions = Some(permissions);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDefinition {
    pub name: String,
    pub description: String,
    pub kind: OptionKind,
    pub required: bool,
    /// (label, value) pairs for string options
    pub choices: Vec<(String, String)>,
}

impl OptionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: OptionKind) -> Self {
        OptionDefinition {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn choice(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.choices.push((label.into(), value.into()));
        self
    }
}

// ============================================================================
// Handler contract
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Settings(#[from] StoreError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} is not supported by this command")]
    Unsupported(&'static str),

    #[error("{0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommandError {
    /// Short label shown to users next to the message
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::Settings(_) => "SettingsError",
            CommandError::InvalidInput(_) => "InvalidInput",
            CommandError::Unsupported(_) => "Unsupported",
            CommandError::Panicked(_) => "Panic",
            CommandError::Other(_) => "Error",
        }
    }
}

pub type CommandResult = Result<(), CommandError>;

/// A handler the dispatcher can route to.
///
/// `descriptor` is read once at registration. `handle` serves both text and
/// interactive invocations; inspect [`CommandContext::invocation`] to tell
/// them apart. Handlers run on a blocking thread and may touch the settings
/// store directly.
pub trait Command: Send + Sync {
    fn descriptor(&self) -> CommandDescriptor;

    fn handle(&self, ctx: &CommandContext) -> CommandResult;

    /// Entry point for button clicks carrying a token for this command
    fn handle_component(&self, action: &str, ctx: &CommandContext) -> CommandResult {
        let _ = (action, ctx);
        Err(CommandError::Unsupported("component interaction"))
    }
}
