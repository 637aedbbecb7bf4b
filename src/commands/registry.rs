//! # Feature: Command Registry
//!
//! Indexes installed commands by invoke name in two independent namespaces:
//! prefixed text commands and interactive (slash) commands.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release with registration-time validation and dual registration
//!
//! The command set is fixed once the process starts. Every failure here is a
//! startup error; nothing is registered after the first event is dispatched.

use super::{Command, CommandDescriptor, InteractiveDefinition};
use log::info;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Text,
    Interactive,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Text => f.write_str("text"),
            Namespace::Interactive => f.write_str("interactive"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command '{0}' must require at least one self permission")]
    MissingPermissions(String),

    #[error("command '{0}' declares neither a text alias nor an interactive name")]
    MissingInvocation(String),

    #[error("command '{command}' has an invalid invoke '{name}'")]
    InvalidName { command: String, name: String },

    #[error("{namespace} invoke '{name}' has already been defined")]
    DuplicateInvoke { namespace: Namespace, name: String },
}

/// A command together with the descriptor captured at registration
#[derive(Clone)]
pub struct RegisteredCommand {
    descriptor: Arc<CommandDescriptor>,
    handler: Arc<dyn Command>,
}

impl RegisteredCommand {
    pub fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> &dyn Command {
        self.handler.as_ref()
    }

    pub fn name(&self) -> &str {
        self.descriptor.label()
    }

    fn same_command(&self, other: &RegisteredCommand) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor)
    }
}

impl fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    text: HashMap<String, RegisteredCommand>,
    interactive: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and install a command in every namespace it declares.
    ///
    /// Nothing is installed if any check fails.
    pub fn register(&mut self, handler: Arc<dyn Command>) -> Result<(), RegistryError> {
        let descriptor = handler.descriptor();
        let label = descriptor.label().to_string();

        if descriptor.self_permissions.is_empty() {
            return Err(RegistryError::MissingPermissions(label));
        }
        if descriptor.aliases.is_empty() && descriptor.interactive.is_none() {
            return Err(RegistryError::MissingInvocation(label));
        }

        let aliases = descriptor
            .aliases
            .iter()
            .map(|alias| normalize(&label, alias))
            .collect::<Result<Vec<_>, _>>()?;
        let interactive_name = descriptor
            .interactive
            .as_ref()
            .map(|definition| normalize(&label, &definition.name))
            .transpose()?;

        for (i, alias) in aliases.iter().enumerate() {
            if self.text.contains_key(alias) || aliases[..i].contains(alias) {
                return Err(RegistryError::DuplicateInvoke {
                    namespace: Namespace::Text,
                    name: alias.clone(),
                });
            }
        }
        if let Some(name) = &interactive_name {
            if self.interactive.contains_key(name) {
                return Err(RegistryError::DuplicateInvoke {
                    namespace: Namespace::Interactive,
                    name: name.clone(),
                });
            }
        }

        let has_interactive = interactive_name.is_some();
        let command = RegisteredCommand {
            descriptor: Arc::new(descriptor),
            handler,
        };
        for alias in &aliases {
            self.text.insert(alias.clone(), command.clone());
        }
        if let Some(name) = interactive_name {
            self.interactive.insert(name, command);
        }

        info!(
            "Registered command '{}' (text: [{}], interactive: {})",
            label,
            aliases.join(", "),
            if has_interactive { "yes" } else { "no" }
        );
        Ok(())
    }

    /// Case-insensitive lookup. `None` is a normal outcome for unknown input.
    pub fn resolve(&self, namespace: Namespace, name: &str) -> Option<&RegisteredCommand> {
        self.table(namespace).get(&name.to_lowercase())
    }

    /// Distinct commands in a namespace, each listed once regardless of alias count
    pub fn list_commands(&self, namespace: Namespace) -> Vec<&RegisteredCommand> {
        let mut commands: Vec<&RegisteredCommand> = Vec::new();
        for command in self.table(namespace).values() {
            if !commands.iter().any(|known| known.same_command(command)) {
                commands.push(command);
            }
        }
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }

    /// Definitions to publish to the platform
    pub fn interactive_definitions(&self) -> Vec<&InteractiveDefinition> {
        self.list_commands(Namespace::Interactive)
            .into_iter()
            .filter_map(|command| command.descriptor().interactive.as_ref())
            .collect()
    }

    fn table(&self, namespace: Namespace) -> &HashMap<String, RegisteredCommand> {
        match namespace {
            Namespace::Text => &self.text,
            Namespace::Interactive => &self.interactive,
        }
    }
}

fn normalize(command: &str, name: &str) -> Result<String, RegistryError> {
    let invalid = name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == ':');
    if invalid {
        return Err(RegistryError::InvalidName {
            command: command.to_string(),
            name: name.to_string(),
        });
    }
    Ok(name.to_lowercase())
}
