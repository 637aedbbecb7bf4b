//! Conversion of interactive definitions into Discord application command payloads

use super::{InteractiveDefinition, OptionDefinition, OptionKind};
use serenity::builder::{CreateApplicationCommand, CreateApplicationCommandOption};
use serenity::model::application::command::CommandOptionType;

impl From<OptionKind> for CommandOptionType {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::String => CommandOptionType::String,
            OptionKind::Integer => CommandOptionType::Integer,
            OptionKind::Boolean => CommandOptionType::Boolean,
            OptionKind::User => CommandOptionType::User,
            OptionKind::Channel => CommandOptionType::Channel,
            OptionKind::Role => CommandOptionType::Role,
        }
    }
}

/// Creates the registration payload for one interactive command
pub fn create_application_command(definition: &InteractiveDefinition) -> CreateApplicationCommand {
    let mut command = CreateApplicationCommand::default();
    command
        .name(&definition.name)
        .description(&definition.description);

    if let Some(permissions) = definition.default_member_permissions {
        command.default_member_permissions(permissions);
    }

    for option in &definition.options {
        command.create_option(|builder| build_option(builder, option));
    }

    command
}

/// Creates payloads for every definition the allowlist admits
pub fn create_commands<'a, I, F>(definitions: I, allows: F) -> Vec<CreateApplicationCommand>
where
    I: IntoIterator<Item = &'a InteractiveDefinition>,
    F: Fn(&str) -> bool,
{
    definitions
        .into_iter()
        .filter(|definition| allows(&definition.name))
        .map(create_application_command)
        .collect()
}

fn build_option<'a>(
    builder: &'a mut CreateApplicationCommandOption,
    option: &OptionDefinition,
) -> &'a mut CreateApplicationCommandOption {
    builder
        .name(&option.name)
        .description(&option.description)
        .kind(option.kind.into())
        .required(option.required);

    for (label, value) in &option.choices {
        builder.add_string_choice(label, value);
    }

    builder
}
