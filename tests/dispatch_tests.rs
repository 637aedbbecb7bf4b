//! End-to-end routing tests: events in, replies and settings files out

use concierge::commands::{
    Category, Command, CommandContext, CommandDescriptor, CommandError, CommandOption,
    CommandRegistry, InteractiveDefinition, Outbound, QueuedResponder, Reply,
};
use concierge::dispatcher::{
    ComponentEvent, Denial, DispatchOutcome, Dispatcher, IgnoreReason, InboundEvent,
    MessageEvent, SlashCommandEvent,
};
use concierge::register_builtin_commands;
use concierge::settings::{DiskSettingsStore, SettingsStore};
use serenity::model::permissions::Permissions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const GUILD: u64 = 10;
const CHANNEL: u64 = 11;
const USER: u64 = 12;

/// Counts its invocations
struct Probe {
    category: Category,
    permissions: Permissions,
    runs: Arc<AtomicUsize>,
}

impl Command for Probe {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(self.category, self.permissions)
            .alias("probe")
            .interactive(InteractiveDefinition::new("probe", "Count invocations"))
    }

    fn handle(&self, ctx: &CommandContext) -> Result<(), CommandError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        ctx.reply("probed");
        Ok(())
    }

    fn handle_component(&self, action: &str, ctx: &CommandContext) -> Result<(), CommandError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        ctx.reply(format!("clicked {action}"));
        Ok(())
    }
}

struct Failing;

impl Command for Failing {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(Category::Other, Permissions::SEND_MESSAGES).alias("fail")
    }

    fn handle(&self, _ctx: &CommandContext) -> Result<(), CommandError> {
        Err(CommandError::InvalidInput("no dice".to_string()))
    }
}

struct Panicking;

impl Command for Panicking {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new(Category::Other, Permissions::SEND_MESSAGES).alias("explode")
    }

    fn handle(&self, _ctx: &CommandContext) -> Result<(), CommandError> {
        panic!("kaboom")
    }
}

struct Fixture {
    dir: TempDir,
    store: Arc<DiskSettingsStore>,
    dispatcher: Dispatcher,
    runs: Arc<AtomicUsize>,
}

impl Fixture {
    fn new(category: Category, permissions: Permissions) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DiskSettingsStore::new(dir.path()));
        let runs = Arc::new(AtomicUsize::new(0));

        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry).unwrap();
        registry
            .register(Arc::new(Probe {
                category,
                permissions,
                runs: runs.clone(),
            }))
            .unwrap();
        registry.register(Arc::new(Failing)).unwrap();
        registry.register(Arc::new(Panicking)).unwrap();

        let dispatcher = Dispatcher::new(Arc::new(registry), store.clone());
        Fixture {
            dir,
            store,
            dispatcher,
            runs,
        }
    }

    fn dispatch(&self, event: impl Into<InboundEvent>) -> (DispatchOutcome, Vec<Outbound>) {
        let (responder, mut receiver) = QueuedResponder::channel();
        let outcome = self
            .dispatcher
            .dispatch(event.into(), Arc::new(responder))
            .unwrap();

        let mut sent = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            sent.push(message);
        }
        (outcome, sent)
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn files_written(&self) -> usize {
        walk(self.dir.path())
    }
}

fn walk(path: &std::path::Path) -> usize {
    std::fs::read_dir(path)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path)
            } else {
                1
            }
        })
        .sum()
}

fn message(content: &str) -> MessageEvent {
    MessageEvent {
        guild_id: GUILD,
        channel_id: CHANNEL,
        author_id: USER,
        content: content.to_string(),
        mentions: Vec::new(),
        self_permissions: Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS,
        member_permissions: Permissions::empty(),
    }
}

fn slash(name: &str, options: Vec<CommandOption>) -> SlashCommandEvent {
    SlashCommandEvent {
        guild_id: GUILD,
        channel_id: CHANNEL,
        user_id: USER,
        name: name.to_string(),
        options,
        self_permissions: Permissions::SEND_MESSAGES,
        member_permissions: Permissions::empty(),
    }
}

fn click(user_id: u64, custom_id: &str) -> ComponentEvent {
    ComponentEvent {
        guild_id: GUILD,
        channel_id: CHANNEL,
        user_id,
        custom_id: custom_id.to_string(),
        self_permissions: Permissions::SEND_MESSAGES,
        member_permissions: Permissions::empty(),
    }
}

fn replies(sent: &[Outbound]) -> Vec<&Reply> {
    sent.iter()
        .filter_map(|message| match message {
            Outbound::Reply(reply) => Some(reply),
            Outbound::Acknowledge => None,
        })
        .collect()
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_unresolved_command_is_a_silent_no_op() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(message("hi!nosuchcommand with args"));
    assert_eq!(
        outcome,
        DispatchOutcome::Ignored(IgnoreReason::UnknownCommand("nosuchcommand".to_string()))
    );
    assert!(sent.is_empty());

    let (_, sent) = fixture.dispatch(slash("nosuchcommand", Vec::new()));
    assert!(sent.is_empty());
    assert_eq!(fixture.files_written(), 0);
}

#[test]
fn test_messages_without_prefix_are_ignored() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(message("just chatting about probe"));
    assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::MissingPrefix));
    assert!(sent.is_empty());

    let (outcome, _) = fixture.dispatch(message("hi!   "));
    assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::EmptyInvocation));
    assert_eq!(fixture.runs(), 0);
}

#[test]
fn test_prefix_and_invoke_are_case_insensitive() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(message("HI!PING"));
    assert_eq!(
        outcome,
        DispatchOutcome::Handled {
            command: "ping".to_string()
        }
    );
    assert_eq!(replies(&sent)[0].content, "Pong!");
}

#[test]
fn test_custom_prefix_replaces_default() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);
    fixture.store.set_prefix(GUILD, "!!").unwrap();

    let (_, sent) = fixture.dispatch(message("!!ping"));
    assert_eq!(replies(&sent)[0].content, "Pong!");

    let (outcome, sent) = fixture.dispatch(message("hi!ping"));
    assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::MissingPrefix));
    assert!(sent.is_empty());
    assert!(fixture.dispatcher.is_command_candidate(GUILD, "!!probe").unwrap());
}

// ============================================================================
// Gate
// ============================================================================

#[test]
fn test_disabled_category_denies_without_reply() {
    let fixture = Fixture::new(Category::Fun, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(message("hi!probe"));
    assert_eq!(
        outcome,
        DispatchOutcome::Denied {
            command: "probe".to_string(),
            reason: Denial::CategoryDisabled(Category::Fun),
        }
    );
    assert!(sent.is_empty());
    assert_eq!(fixture.runs(), 0);

    fixture
        .store
        .set_category_enabled(GUILD, Category::Fun, true)
        .unwrap();
    let (_, sent) = fixture.dispatch(message("hi!probe"));
    assert_eq!(replies(&sent)[0].content, "probed");
    assert_eq!(fixture.runs(), 1);
}

#[test]
fn test_missing_self_permission_denies() {
    let fixture = Fixture::new(
        Category::Economy,
        Permissions::SEND_MESSAGES | Permissions::MANAGE_ROLES,
    );
    fixture
        .store
        .set_category_enabled(GUILD, Category::Economy, true)
        .unwrap();

    let (outcome, sent) = fixture.dispatch(message("hi!probe"));
    assert!(matches!(
        outcome,
        DispatchOutcome::Denied {
            reason: Denial::MissingPermissions,
            ..
        }
    ));
    assert!(sent.is_empty());
    assert_eq!(fixture.runs(), 0);
}

#[test]
fn test_other_category_skips_gate() {
    let fixture = Fixture::new(Category::Other, Permissions::ADMINISTRATOR);

    let (_, sent) = fixture.dispatch(slash("probe", Vec::new()));
    assert_eq!(replies(&sent)[0].content, "probed");
    assert_eq!(fixture.runs(), 1);
}

#[test]
fn test_builtin_category_gating() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (_, sent) = fixture.dispatch(message("hi!bal"));
    assert!(sent.is_empty());

    fixture
        .store
        .set_category_enabled(GUILD, Category::Economy, true)
        .unwrap();
    let (_, sent) = fixture.dispatch(message("hi!bal"));
    assert!(replies(&sent)[0].content.contains("Cash: 0"));
}

// ============================================================================
// Failure containment
// ============================================================================

#[test]
fn test_handler_error_is_reported() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(message("hi!fail"));
    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            command: "fail".to_string(),
            kind: "InvalidInput",
        }
    );
    assert_eq!(
        replies(&sent)[0].content,
        "Oops, it looks like something went wrong...\n*InvalidInput: no dice*"
    );
}

#[test]
fn test_handler_panic_is_contained() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(message("hi!explode"));
    assert!(matches!(outcome, DispatchOutcome::Failed { kind: "Panic", .. }));
    assert_eq!(
        replies(&sent)[0].content,
        "Oops, it looks like something went wrong...\n*Panic: kaboom*"
    );

    // the dispatcher keeps working afterwards
    let (_, sent) = fixture.dispatch(message("hi!ping"));
    assert_eq!(replies(&sent)[0].content, "Pong!");
}

// ============================================================================
// Components
// ============================================================================

#[test]
fn test_component_for_another_user_is_ignored() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(click(USER + 1, &format!("{USER}:probe:go")));
    assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::ForeignToken));
    assert!(sent.is_empty());

    let (outcome, sent) = fixture.dispatch(click(USER, "probe:go"));
    assert_eq!(outcome, DispatchOutcome::Ignored(IgnoreReason::MalformedToken));
    assert!(sent.is_empty());
    assert_eq!(fixture.runs(), 0);
}

#[test]
fn test_component_is_acknowledged_before_handling() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (_, sent) = fixture.dispatch(click(USER, &format!("{USER}:probe:go:extra")));
    assert_eq!(sent[0], Outbound::Acknowledge);
    assert_eq!(replies(&sent)[0].content, "clicked go");
}

#[test]
fn test_component_uses_the_same_gate() {
    let fixture = Fixture::new(Category::Personality, Permissions::SEND_MESSAGES);

    let (outcome, sent) = fixture.dispatch(click(USER, &format!("{USER}:probe:go")));
    assert!(matches!(outcome, DispatchOutcome::Denied { .. }));
    assert_eq!(sent, vec![Outbound::Acknowledge]);
}

#[test]
fn test_balance_buttons_round_trip() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);
    fixture
        .store
        .set_category_enabled(GUILD, Category::Economy, true)
        .unwrap();
    fixture.store.set_cash_amount(USER, 70).unwrap();

    let (_, sent) = fixture.dispatch(slash("balance", Vec::new()));
    let deposit = replies(&sent)[0].buttons[0].custom_id.clone();

    let (outcome, sent) = fixture.dispatch(click(USER, &deposit));
    assert_eq!(
        outcome,
        DispatchOutcome::Handled {
            command: "balance".to_string()
        }
    );
    assert_eq!(replies(&sent)[0].content, "Deposited 70 to your bank");
    assert_eq!(fixture.store.bank_amount(USER).unwrap(), 70);
    assert_eq!(fixture.store.cash_amount(USER).unwrap(), 0);
}

// ============================================================================
// Built-in commands through the dispatcher
// ============================================================================

#[test]
fn test_timezone_slash_command_with_member_option() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);
    fixture
        .store
        .set_category_enabled(GUILD, Category::Personality, true)
        .unwrap();
    fixture.store.set_timezone(99, "America/Chicago").unwrap();

    let (_, sent) = fixture.dispatch(slash(
        "timezone",
        vec![CommandOption::new("member", "99")],
    ));
    assert_eq!(
        replies(&sent)[0].content,
        "The timezone of <@99> is set to ``America/Chicago``"
    );
}

#[test]
fn test_settings_requires_manage_guild() {
    let fixture = Fixture::new(Category::Other, Permissions::SEND_MESSAGES);

    let (_, sent) = fixture.dispatch(message("hi!settings prefix ??"));
    assert!(replies(&sent)[0].content.contains("Manage Server"));
    assert_eq!(fixture.store.prefix(GUILD).unwrap(), "hi!");

    let mut event = message("hi!settings prefix ??");
    event.member_permissions = Permissions::MANAGE_GUILD;
    fixture.dispatch(event);
    assert_eq!(fixture.store.prefix(GUILD).unwrap(), "??");

    let (_, sent) = fixture.dispatch(message("??ping"));
    assert_eq!(replies(&sent)[0].content, "Pong!");
}
