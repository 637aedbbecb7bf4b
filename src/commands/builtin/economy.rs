//! Economy commands: balance
//!
//! The balance reply carries deposit and withdraw buttons. Their component ids
//! are `<user>:balance:<action>` and come back through `handle_component`.

use crate::commands::{
    Button, Category, Command, CommandContext, CommandDescriptor, CommandError, CommandResult,
    ComponentToken, InteractiveDefinition, Reply,
};
use serenity::model::permissions::Permissions;

const COMMAND_NAME: &str = "balance";
const DEPOSIT: &str = "deposit";
const WITHDRAW: &str = "withdraw";

pub struct BalanceCommand;

impl Command for BalanceCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(Category::Economy, Permissions::SEND_MESSAGES)
            .alias(COMMAND_NAME)
            .alias("bal")
            .interactive(InteractiveDefinition::new(
                COMMAND_NAME,
                "Show your cash and bank balance",
            ))
    }

    fn handle(&self, ctx: &CommandContext) -> CommandResult {
        let store = ctx.store();
        let cash = store.cash_amount(ctx.user_id)?;
        let bank = store.bank_amount(ctx.user_id)?;

        let reply = Reply::text(format!(
            "<@{}>'s balance\nCash: {cash}\nBank: {bank}\nTotal: {}",
            ctx.user_id,
            cash.saturating_add(bank)
        ))
        .with_button(Button::new(
            &ComponentToken::new(ctx.user_id, COMMAND_NAME, DEPOSIT),
            "Deposit all",
        ))
        .with_button(Button::new(
            &ComponentToken::new(ctx.user_id, COMMAND_NAME, WITHDRAW),
            "Withdraw all",
        ));

        ctx.send(reply);
        Ok(())
    }

    fn handle_component(&self, action: &str, ctx: &CommandContext) -> CommandResult {
        let store = ctx.store();
        let cash = store.cash_amount(ctx.user_id)?;
        let bank = store.bank_amount(ctx.user_id)?;

        match action {
            DEPOSIT if cash <= 0 => ctx.reply_private("You don't have any cash to deposit"),
            DEPOSIT => {
                store.set_bank_amount(ctx.user_id, bank.saturating_add(cash))?;
                store.set_cash_amount(ctx.user_id, 0)?;
                ctx.reply_private(format!("Deposited {cash} to your bank"));
            }
            WITHDRAW if bank <= 0 => ctx.reply_private("You don't have any money in your bank"),
            WITHDRAW => {
                store.set_cash_amount(ctx.user_id, cash.saturating_add(bank))?;
                store.set_bank_amount(ctx.user_id, 0)?;
                ctx.reply_private(format!("Withdrew {bank} from your bank"));
            }
            other => {
                return Err(CommandError::InvalidInput(format!(
                    "unknown balance action '{other}'"
                )))
            }
        }
        Ok(())
    }
}
