//! Commands bundled with the bot
//!
//! - `utility`: /ping
//! - `admin`: /settings
//! - `personality`: /timezone, settimezone, birthday
//! - `economy`: /balance with deposit and withdraw buttons

pub mod admin;
pub mod economy;
pub mod personality;
pub mod utility;

use super::{Command, CommandRegistry, RegistryError};
use std::sync::Arc;

/// Every bundled command, in registration order
pub fn builtin_commands() -> Vec<Arc<dyn Command>> {
    vec![
        Arc::new(utility::PingCommand),
        Arc::new(admin::SettingsCommand),
        Arc::new(personality::TimezoneCommand),
        Arc::new(personality::SetTimezoneCommand),
        Arc::new(personality::BirthdayCommand),
        Arc::new(economy::BalanceCommand),
    ]
}

/// Installs the bundled commands. Any error is a startup failure.
pub fn register_builtin_commands(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    for command in builtin_commands() {
        registry.register(command)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::commands::{
        CommandContext, CommandOption, Invocation, Outbound, QueuedResponder, Reply,
    };
    use crate::settings::{DiskSettingsStore, SettingsStore};
    use serenity::model::permissions::Permissions;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    pub const GUILD: u64 = 100;
    pub const USER: u64 = 200;

    pub struct Harness {
        pub _dir: TempDir,
        pub store: Arc<DiskSettingsStore>,
    }

    impl Harness {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = Arc::new(DiskSettingsStore::new(dir.path()));
            Harness { _dir: dir, store }
        }

        pub fn context(
            &self,
            invocation: Invocation,
            member_permissions: Permissions,
        ) -> (CommandContext, UnboundedReceiver<Outbound>) {
            let (responder, receiver) = QueuedResponder::channel();
            let store: Arc<dyn SettingsStore> = self.store.clone();
            let ctx = CommandContext::new(
                GUILD,
                1,
                USER,
                Permissions::all(),
                member_permissions,
                invocation,
                store,
                Arc::new(responder),
            );
            (ctx, receiver)
        }

        pub fn text(&self, args: &[&str]) -> (CommandContext, UnboundedReceiver<Outbound>) {
            self.context(
                Invocation::Text {
                    args: args.iter().map(|arg| arg.to_string()).collect(),
                    mentions: Vec::new(),
                },
                Permissions::empty(),
            )
        }

        pub fn interactive(
            &self,
            options: Vec<CommandOption>,
        ) -> (CommandContext, UnboundedReceiver<Outbound>) {
            self.context(Invocation::Interactive { options }, Permissions::empty())
        }
    }

    pub fn replies(receiver: &mut UnboundedReceiver<Outbound>) -> Vec<Reply> {
        let mut replies = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            if let Outbound::Reply(reply) = message {
                replies.push(reply);
            }
        }
        replies
    }
}
