//! # Feature: Command Dispatcher
//!
//! Routes text messages, slash commands and button clicks to registered
//! commands, applies the category and permission gate, and contains handler
//! failures.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Button clicks routed through component tokens
//! - 1.0.0: Text and slash routing with a shared gate

pub mod event;

pub use event::{ComponentEvent, InboundEvent, MessageEvent, SlashCommandEvent};

use crate::commands::{
    Category, CommandContext, CommandError, CommandRegistry, ComponentToken, Invocation,
    Namespace, RegisteredCommand, Reply, Responder,
};
use crate::settings::{SettingsStore, StoreError};
use log::{debug, error, warn};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Why an event produced no work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    MissingPrefix,
    EmptyInvocation,
    UnknownCommand(String),
    MalformedToken,
    ForeignToken,
}

/// Why a resolved command was not run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    CategoryDisabled(Category),
    MissingPermissions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored(IgnoreReason),
    Denied { command: String, reason: Denial },
    Handled { command: String },
    /// The handler failed or panicked; a failure reply was sent
    Failed { command: String, kind: &'static str },
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Ignored(reason) => write!(f, "ignored ({reason:?})"),
            DispatchOutcome::Denied { command, reason } => {
                write!(f, "'{command}' denied ({reason:?})")
            }
            DispatchOutcome::Handled { command } => write!(f, "'{command}' handled"),
            DispatchOutcome::Failed { command, kind } => write!(f, "'{command}' failed ({kind})"),
        }
    }
}

/// Failures that stop a dispatch before any handler runs
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to read guild settings: {0}")]
    Settings(#[from] StoreError),
}

/// A resolved command with the context it will run in
struct ResolvedInvocation<'a> {
    command: &'a RegisteredCommand,
    ctx: CommandContext,
}

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    store: Arc<dyn SettingsStore>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, store: Arc<dyn SettingsStore>) -> Self {
        Dispatcher { registry, store }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    /// Cheap precheck so the gateway adapter can skip chatter without
    /// resolving permissions. Reads the guild prefix through the cache.
    pub fn is_command_candidate(&self, guild_id: u64, content: &str) -> Result<bool, DispatchError> {
        let prefix = self.store.prefix(guild_id)?;
        Ok(strip_prefix_ignore_case(content, &prefix).is_some())
    }

    /// Route one event. Blocks on settings I/O; call from a blocking thread.
    ///
    /// Replies go to `responder`. An `Err` means the gate could not be
    /// evaluated and nothing was sent.
    pub fn dispatch(
        &self,
        event: InboundEvent,
        responder: Arc<dyn Responder>,
    ) -> Result<DispatchOutcome, DispatchError> {
        match event {
            InboundEvent::Message(event) => self.handle_message(event, responder),
            InboundEvent::SlashCommand(event) => self.handle_slash_command(event, responder),
            InboundEvent::Component(event) => self.handle_component(event, responder),
        }
    }

    fn handle_message(
        &self,
        event: MessageEvent,
        responder: Arc<dyn Responder>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let prefix = self.store.prefix(event.guild_id)?;
        let Some(rest) = strip_prefix_ignore_case(&event.content, &prefix) else {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::MissingPrefix));
        };

        let mut words = rest.split_whitespace();
        let Some(invoke) = words.next() else {
            return Ok(DispatchOutcome::Ignored(IgnoreReason::EmptyInvocation));
        };
        let Some(command) = self.registry.resolve(Namespace::Text, invoke) else {
            debug!("No text command named '{invoke}'");
            return Ok(DispatchOutcome::Ignored(IgnoreReason::UnknownCommand(
                invoke.to_string(),
            )));
        };

        let invocation = Invocation::Text {
            args: words.map(str::to_string).collect(),
            mentions: event.mentions,
        };
        let ctx = CommandContext::new(
            event.guild_id,
            event.channel_id,
            event.author_id,
            event.self_permissions,
            event.member_permissions,
            invocation,
            self.store.clone(),
            responder,
        );
        self.run(ResolvedInvocation { command, ctx }, None)
    }

    fn handle_slash_command(
        &self,
        event: SlashCommandEvent,
        responder: Arc<dyn Responder>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(command) = self.registry.resolve(Namespace::Interactive, &event.name) else {
            debug!("No interactive command named '{}'", event.name);
            return Ok(DispatchOutcome::Ignored(IgnoreReason::UnknownCommand(
                event.name,
            )));
        };

        let ctx = CommandContext::new(
            event.guild_id,
            event.channel_id,
            event.user_id,
            event.self_permissions,
            event.member_permissions,
            Invocation::Interactive {
                options: event.options,
            },
            self.store.clone(),
            responder,
        );
        self.run(ResolvedInvocation { command, ctx }, None)
    }

    fn handle_component(
        &self,
        event: ComponentEvent,
        responder: Arc<dyn Responder>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(token) = ComponentToken::parse(&event.custom_id) else {
            debug!("Ignoring component with malformed id '{}'", event.custom_id);
            return Ok(DispatchOutcome::Ignored(IgnoreReason::MalformedToken));
        };
        if !token.issued_to(event.user_id) {
            debug!(
                "Ignoring click by user {} on a component issued to user {}",
                event.user_id, token.user_id
            );
            return Ok(DispatchOutcome::Ignored(IgnoreReason::ForeignToken));
        }

        responder.acknowledge();

        let Some(command) = self.registry.resolve(Namespace::Interactive, &token.command) else {
            debug!("No interactive command named '{}'", token.command);
            return Ok(DispatchOutcome::Ignored(IgnoreReason::UnknownCommand(
                token.command,
            )));
        };

        let action = token.action.clone();
        let ctx = CommandContext::new(
            event.guild_id,
            event.channel_id,
            event.user_id,
            event.self_permissions,
            event.member_permissions,
            Invocation::Component { token },
            self.store.clone(),
            responder,
        );
        self.run(ResolvedInvocation { command, ctx }, Some(&action))
    }

    /// Gate, then invoke with failure containment
    fn run(
        &self,
        resolved: ResolvedInvocation<'_>,
        action: Option<&str>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let ResolvedInvocation { command, ctx } = resolved;
        let name = command.name().to_string();

        if let Some(reason) = self.gate(command, &ctx)? {
            debug!("Command '{name}' denied in guild {}: {reason:?}", ctx.guild_id);
            return Ok(DispatchOutcome::Denied {
                command: name,
                reason,
            });
        }

        let handler = command.handler();
        let result = catch_unwind(AssertUnwindSafe(|| match action {
            Some(action) => handler.handle_component(action, &ctx),
            None => handler.handle(&ctx),
        }))
        .unwrap_or_else(|payload| Err(CommandError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => Ok(DispatchOutcome::Handled { command: name }),
            Err(e) => {
                error!(
                    "Command '{name}' failed in guild {} for user {}: {e}",
                    ctx.guild_id, ctx.user_id
                );
                let kind = e.kind();
                ctx.send(Reply::text(format!(
                    "Oops, it looks like something went wrong...\n*{kind}: {e}*"
                )));
                Ok(DispatchOutcome::Failed {
                    command: name,
                    kind,
                })
            }
        }
    }

    fn gate(
        &self,
        command: &RegisteredCommand,
        ctx: &CommandContext,
    ) -> Result<Option<Denial>, DispatchError> {
        let descriptor = command.descriptor();
        if descriptor.category == Category::Other {
            return Ok(None);
        }

        if !self
            .store
            .category_enabled(ctx.guild_id, descriptor.category)?
        {
            return Ok(Some(Denial::CategoryDisabled(descriptor.category)));
        }

        if !ctx.self_permissions.contains(descriptor.self_permissions) {
            warn!(
                "Missing permissions {:?} for '{}' in guild {}",
                descriptor.self_permissions - ctx.self_permissions,
                command.name(),
                ctx.guild_id
            );
            return Ok(Some(Denial::MissingPermissions));
        }

        Ok(None)
    }
}

/// Remainder after `prefix`, compared without regard to case
fn strip_prefix_ignore_case<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let head = content.get(..prefix.len())?;
    head.to_lowercase()
        .eq(&prefix.to_lowercase())
        .then(|| &content[prefix.len()..])
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
