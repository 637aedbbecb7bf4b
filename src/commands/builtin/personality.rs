//! Personality commands: timezone, settimezone, birthday

use crate::commands::{
    Category, Command, CommandContext, CommandDescriptor, CommandResult, InteractiveDefinition,
    OptionDefinition, OptionKind,
};
use crate::settings::BIRTHDATE_FORMAT;
use chrono::{NaiveDate, Utc};
use serenity::model::permissions::Permissions;

const MAX_TIMEZONE_LEN: usize = 64;

// ============================================================================
// timezone
// ============================================================================

pub struct TimezoneCommand;

impl Command for TimezoneCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(Category::Personality, Permissions::SEND_MESSAGES)
            .alias("timezone")
            .alias("gettimezone")
            .alias("gettz")
            .interactive(
                InteractiveDefinition::new("timezone", "Show your timezone or someone else's")
                    .option(OptionDefinition::new(
                        "member",
                        "Whose timezone to show",
                        OptionKind::User,
                    )),
            )
    }

    fn handle(&self, ctx: &CommandContext) -> CommandResult {
        let target = if ctx.is_text() {
            match (ctx.mentions().first(), ctx.args().is_empty()) {
                (Some(id), _) => Some(*id),
                (None, true) => Some(ctx.user_id),
                (None, false) => None,
            }
        } else if ctx.option("member").is_some() {
            ctx.option_user("member")
        } else {
            Some(ctx.user_id)
        };

        let Some(target) = target else {
            ctx.reply_private("Please specify a valid user");
            return Ok(());
        };

        match ctx.store().timezone(target)? {
            Some(timezone) if target == ctx.user_id => {
                ctx.reply(format!("Your timezone is set to ``{timezone}``"));
            }
            Some(timezone) => {
                ctx.reply(format!("The timezone of <@{target}> is set to ``{timezone}``"));
            }
            None if target == ctx.user_id => {
                let prefix = ctx.usage_prefix()?;
                ctx.reply_private(format!(
                    "You don't have your timezone set. Please use {prefix}settimezone <timezone> \
                     to set your timezone"
                ));
            }
            None => {
                ctx.reply_private(format!("<@{target}> doesn't have their timezone set"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// settimezone
// ============================================================================

pub struct SetTimezoneCommand;

impl Command for SetTimezoneCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(Category::Personality, Permissions::SEND_MESSAGES)
            .alias("settimezone")
            .alias("settz")
    }

    fn handle(&self, ctx: &CommandContext) -> CommandResult {
        let Some(timezone) = ctx.args().first() else {
            let prefix = ctx.usage_prefix()?;
            ctx.reply_private(format!(
                "Usage: {prefix}settimezone <timezone>, for example Europe/Berlin"
            ));
            return Ok(());
        };

        if !looks_like_timezone(timezone) {
            ctx.reply_private(format!("``{timezone}`` is not a valid timezone"));
            return Ok(());
        }

        ctx.store().set_timezone(ctx.user_id, timezone)?;
        ctx.reply(format!("Your timezone has been set to ``{timezone}``"));
        Ok(())
    }
}

/// Shape check only. Identifiers are stored as given and never resolved.
fn looks_like_timezone(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_TIMEZONE_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+' | ':'))
}

// ============================================================================
// birthday
// ============================================================================

pub struct BirthdayCommand;

impl Command for BirthdayCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(Category::Personality, Permissions::SEND_MESSAGES)
            .alias("birthday")
            .alias("birthdate")
    }

    fn handle(&self, ctx: &CommandContext) -> CommandResult {
        let Some(raw) = ctx.args().first() else {
            match ctx.store().birthdate(ctx.user_id)? {
                Some(date) => ctx.reply(format!(
                    "Your birthday is set to {}",
                    date.format(BIRTHDATE_FORMAT)
                )),
                None => {
                    let prefix = ctx.usage_prefix()?;
                    ctx.reply_private(format!(
                        "You don't have your birthday set. Please use {prefix}birthday \
                         <YYYY-MM-DD> to set it"
                    ));
                }
            }
            return Ok(());
        };

        let date = match NaiveDate::parse_from_str(raw, BIRTHDATE_FORMAT) {
            Ok(date) if date <= Utc::now().date_naive() => date,
            _ => {
                ctx.reply_private(format!(
                    "``{raw}`` is not a valid birthday, use the format YYYY-MM-DD"
                ));
                return Ok(());
            }
        };

        ctx.store().set_birthdate(ctx.user_id, date)?;
        ctx.reply(format!(
            "Your birthday has been set to {}",
            date.format(BIRTHDATE_FORMAT)
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin::testing::{replies, Harness, USER};
    use crate::commands::{CommandOption, Invocation};
    use crate::settings::SettingsStore;

    #[test]
    fn test_timezone_unset_points_to_settimezone() {
        let harness = Harness::new();
        let (ctx, mut receiver) = harness.text(&[]);

        TimezoneCommand.handle(&ctx).unwrap();
        assert_eq!(
            replies(&mut receiver)[0].content,
            "You don't have your timezone set. Please use hi!settimezone <timezone> to set your timezone"
        );
    }

    #[test]
    fn test_timezone_of_mentioned_member() {
        let harness = Harness::new();
        harness.store.set_timezone(300, "Asia/Tokyo").unwrap();
        let (ctx, mut receiver) = harness.context(
            Invocation::Text {
                args: vec!["<@300>".to_string()],
                mentions: vec![300],
            },
            Permissions::empty(),
        );

        TimezoneCommand.handle(&ctx).unwrap();
        assert_eq!(
            replies(&mut receiver)[0].content,
            "The timezone of <@300> is set to ``Asia/Tokyo``"
        );
    }

    #[test]
    fn test_timezone_rejects_argument_without_mention() {
        let harness = Harness::new();
        let (ctx, mut receiver) = harness.text(&["somebody"]);

        TimezoneCommand.handle(&ctx).unwrap();
        assert_eq!(replies(&mut receiver)[0].content, "Please specify a valid user");
    }

    #[test]
    fn test_interactive_timezone_uses_slash_prefix_in_hint() {
        let harness = Harness::new();
        let (ctx, mut receiver) = harness.interactive(Vec::new());

        TimezoneCommand.handle(&ctx).unwrap();
        let reply = &replies(&mut receiver)[0];
        assert!(reply.ephemeral);
        assert!(reply.content.contains("/settimezone"));
    }

    #[test]
    fn test_interactive_timezone_member_option() {
        let harness = Harness::new();
        harness.store.set_timezone(301, "UTC").unwrap();
        let (ctx, mut receiver) = harness.interactive(vec![CommandOption::new("member", "301")]);

        TimezoneCommand.handle(&ctx).unwrap();
        assert_eq!(
            replies(&mut receiver)[0].content,
            "The timezone of <@301> is set to ``UTC``"
        );
    }

    #[test]
    fn test_settimezone_stores_identifier() {
        let harness = Harness::new();
        let (ctx, _receiver) = harness.text(&["Europe/Berlin"]);

        SetTimezoneCommand.handle(&ctx).unwrap();
        assert_eq!(
            harness.store.timezone(USER).unwrap(),
            Some("Europe/Berlin".to_string())
        );
    }

    #[test]
    fn test_settimezone_rejects_garbage() {
        let harness = Harness::new();
        let (ctx, _receiver) = harness.text(&["<script>"]);

        SetTimezoneCommand.handle(&ctx).unwrap();
        assert_eq!(harness.store.timezone(USER).unwrap(), None);
    }

    #[test]
    fn test_birthday_set_and_show() {
        let harness = Harness::new();
        let (ctx, _receiver) = harness.text(&["1990-04-01"]);
        BirthdayCommand.handle(&ctx).unwrap();

        let (ctx, mut receiver) = harness.text(&[]);
        BirthdayCommand.handle(&ctx).unwrap();
        assert_eq!(
            replies(&mut receiver)[0].content,
            "Your birthday is set to 1990-04-01"
        );
    }

    #[test]
    fn test_birthday_rejects_invalid_dates() {
        let harness = Harness::new();
        for raw in ["1990-13-01", "01/04/1990", "9999-01-01"] {
            let (ctx, _receiver) = harness.text(&[raw]);
            BirthdayCommand.handle(&ctx).unwrap();
        }
        assert_eq!(harness.store.birthdate(USER).unwrap(), None);
    }
}
