// Core layer - shared configuration
pub mod core;

// Storage layer - per-guild and per-user settings
pub mod settings;

// Application layer
pub mod commands;
pub mod dispatcher;

pub use crate::core::BotConfig;
pub use commands::{register_builtin_commands, Category, Command, CommandRegistry};
pub use dispatcher::{DispatchOutcome, Dispatcher, InboundEvent};
pub use settings::{DiskSettingsStore, SettingsStore};
