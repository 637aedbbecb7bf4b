//! Utility commands: ping

use crate::commands::{
    Category, Command, CommandContext, CommandDescriptor, CommandResult, InteractiveDefinition,
};
use serenity::model::permissions::Permissions;

pub struct PingCommand;

impl Command for PingCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(Category::Other, Permissions::SEND_MESSAGES)
            .alias("ping")
            .interactive(InteractiveDefinition::new("ping", "Test bot responsiveness"))
    }

    fn handle(&self, ctx: &CommandContext) -> CommandResult {
        ctx.reply("Pong!");
        Ok(())
    }
}
