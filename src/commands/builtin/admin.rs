//! Admin commands: settings
//!
//! Shows and changes the guild's prefix and category toggles. Only members
//! holding Manage Server may change anything.

use crate::commands::{
    Category, Command, CommandContext, CommandDescriptor, CommandResult, InteractiveDefinition,
    OptionDefinition, OptionKind,
};
use serenity::model::permissions::Permissions;

/// Longest prefix a guild may configure
const MAX_PREFIX_LEN: usize = 16;

pub struct SettingsCommand;

impl Command for SettingsCommand {
    fn descriptor(&self) -> CommandDescriptor {
        let category_option = Category::GATED.into_iter().fold(
            OptionDefinition::new("category", "Category to switch on or off", OptionKind::String),
            |option, category| option.choice(category.name(), category.name()),
        );

        CommandDescriptor::new(Category::Other, Permissions::SEND_MESSAGES)
            .alias("settings")
            .interactive(
                InteractiveDefinition::new("settings", "Show or change this server's settings")
                    .option(OptionDefinition::new(
                        "prefix",
                        "New prefix for text commands",
                        OptionKind::String,
                    ))
                    .option(category_option)
                    .option(OptionDefinition::new(
                        "enabled",
                        "Whether the category should be enabled",
                        OptionKind::Boolean,
                    ))
                    .default_member_permissions(Permissions::MANAGE_GUILD),
            )
    }

    fn handle(&self, ctx: &CommandContext) -> CommandResult {
        if !can_manage(ctx.member_permissions) {
            ctx.reply_private("You need the Manage Server permission to use this command.");
            return Ok(());
        }

        let request = if ctx.is_text() {
            parse_text_request(ctx.args())
        } else {
            interactive_request(ctx)
        };

        match request {
            Request::Show => show(ctx),
            Request::SetPrefix(prefix) => set_prefix(ctx, &prefix),
            Request::Toggle(name, enabled) => toggle(ctx, &name, enabled),
            Request::Usage => {
                let prefix = ctx.usage_prefix()?;
                ctx.reply_private(format!(
                    "Usage: {prefix}settings, {prefix}settings prefix <prefix> or \
                     {prefix}settings category <name> <on|off>"
                ));
                Ok(())
            }
        }
    }
}

enum Request {
    Show,
    SetPrefix(String),
    Toggle(String, bool),
    Usage,
}

fn can_manage(permissions: Permissions) -> bool {
    permissions.administrator() || permissions.manage_guild()
}

fn parse_text_request(args: &[String]) -> Request {
    match args {
        [] => Request::Show,
        [field, value] if field.eq_ignore_ascii_case("prefix") => Request::SetPrefix(value.clone()),
        [field, name, state] if field.eq_ignore_ascii_case("category") => {
            match parse_switch(state) {
                Some(enabled) => Request::Toggle(name.clone(), enabled),
                None => Request::Usage,
            }
        }
        _ => Request::Usage,
    }
}

fn interactive_request(ctx: &CommandContext) -> Request {
    if let Some(prefix) = ctx.option_str("prefix") {
        return Request::SetPrefix(prefix.to_string());
    }
    match (ctx.option_str("category"), ctx.option_bool("enabled")) {
        (Some(name), Some(enabled)) => Request::Toggle(name.to_string(), enabled),
        (None, None) => Request::Show,
        _ => Request::Usage,
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "enable" | "enabled" | "true" => Some(true),
        "off" | "disable" | "disabled" | "false" => Some(false),
        _ => None,
    }
}

fn show(ctx: &CommandContext) -> CommandResult {
    let store = ctx.store();
    let prefix = store.prefix(ctx.guild_id)?;
    let enabled = store.enabled_categories(ctx.guild_id)?;

    let mut lines = vec![format!("Prefix: `{prefix}`"), "Categories:".to_string()];
    for category in Category::GATED {
        let state = if enabled.contains(&category) { "on" } else { "off" };
        lines.push(format!("- {category}: {state}"));
    }

    ctx.reply_private(lines.join("\n"));
    Ok(())
}

fn set_prefix(ctx: &CommandContext, prefix: &str) -> CommandResult {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN || prefix.chars().any(char::is_whitespace)
    {
        ctx.reply_private(format!(
            "The prefix must be 1 to {MAX_PREFIX_LEN} characters without spaces."
        ));
        return Ok(());
    }

    ctx.store().set_prefix(ctx.guild_id, prefix)?;
    ctx.reply(format!("The prefix is now `{prefix}`"));
    Ok(())
}

fn toggle(ctx: &CommandContext, name: &str, enabled: bool) -> CommandResult {
    let category = match name.parse::<Category>() {
        Ok(category) if category.mask().is_some() => category,
        _ => {
            let names: Vec<&str> = Category::GATED.iter().map(Category::name).collect();
            ctx.reply_private(format!(
                "Unknown category `{name}`. Choose one of: {}",
                names.join(", ")
            ));
            return Ok(());
        }
    };

    ctx.store()
        .set_category_enabled(ctx.guild_id, category, enabled)?;
    let state = if enabled { "enabled" } else { "disabled" };
    ctx.reply(format!("The {category} category is now {state}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin::testing::{replies, Harness, GUILD};
    use crate::commands::{CommandOption, Invocation, Outbound};
    use crate::settings::SettingsStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn text_as_manager(
        harness: &Harness,
        args: &[&str],
    ) -> (CommandContext, UnboundedReceiver<Outbound>) {
        harness.context(
            Invocation::Text {
                args: args.iter().map(|arg| arg.to_string()).collect(),
                mentions: Vec::new(),
            },
            Permissions::MANAGE_GUILD,
        )
    }

    #[test]
    fn test_members_without_manage_guild_are_refused() {
        let harness = Harness::new();
        let (ctx, mut receiver) = harness.text(&["prefix", "!!"]);

        SettingsCommand.handle(&ctx).unwrap();
        assert_eq!(harness.store.prefix(GUILD).unwrap(), "hi!");
        assert!(replies(&mut receiver)[0].content.contains("Manage Server"));
    }

    #[test]
    fn test_text_prefix_change() {
        let harness = Harness::new();
        let (ctx, mut receiver) = text_as_manager(&harness, &["prefix", "!!"]);

        SettingsCommand.handle(&ctx).unwrap();
        assert_eq!(harness.store.prefix(GUILD).unwrap(), "!!");
        assert_eq!(replies(&mut receiver)[0].content, "The prefix is now `!!`");
    }

    #[test]
    fn test_text_category_toggle() {
        let harness = Harness::new();
        let (ctx, _receiver) = text_as_manager(&harness, &["category", "Fun", "on"]);
        SettingsCommand.handle(&ctx).unwrap();
        assert!(harness.store.category_enabled(GUILD, Category::Fun).unwrap());

        let (ctx, _receiver) = text_as_manager(&harness, &["category", "fun", "off"]);
        SettingsCommand.handle(&ctx).unwrap();
        assert!(!harness.store.category_enabled(GUILD, Category::Fun).unwrap());
    }

    #[test]
    fn test_other_category_cannot_be_toggled() {
        let harness = Harness::new();
        let (ctx, mut receiver) = text_as_manager(&harness, &["category", "other", "off"]);

        SettingsCommand.handle(&ctx).unwrap();
        assert!(replies(&mut receiver)[0].content.starts_with("Unknown category"));
        assert!(!harness.store.record_path(ctx.community()).exists());
    }

    #[test]
    fn test_interactive_summary_is_ephemeral() {
        let harness = Harness::new();
        harness.store.set_category_enabled(GUILD, Category::Economy, true).unwrap();
        let (ctx, mut receiver) = harness.context(
            Invocation::Interactive { options: Vec::new() },
            Permissions::ADMINISTRATOR,
        );

        SettingsCommand.handle(&ctx).unwrap();
        let reply = &replies(&mut receiver)[0];
        assert!(reply.ephemeral);
        assert!(reply.content.contains("Prefix: `hi!`"));
        assert!(reply.content.contains("- economy: on"));
        assert!(reply.content.contains("- fun: off"));
    }

    #[test]
    fn test_interactive_toggle_needs_both_options() {
        let harness = Harness::new();
        let (ctx, mut receiver) = harness.context(
            Invocation::Interactive {
                options: vec![CommandOption::new("category", "economy")],
            },
            Permissions::MANAGE_GUILD,
        );

        SettingsCommand.handle(&ctx).unwrap();
        assert!(replies(&mut receiver)[0].content.starts_with("Usage: /settings"));
    }

    #[test]
    fn test_rejects_prefix_with_spaces() {
        assert!(matches!(
            parse_text_request(&["prefix".to_string(), "a".to_string(), "b".to_string()]),
            Request::Usage
        ));

        let harness = Harness::new();
        let (ctx, _receiver) = harness.context(
            Invocation::Interactive {
                options: vec![CommandOption::new("prefix", "a b")],
            },
            Permissions::MANAGE_GUILD,
        );
        SettingsCommand.handle(&ctx).unwrap();
        assert_eq!(harness.store.prefix(GUILD).unwrap(), "hi!");
    }
}
