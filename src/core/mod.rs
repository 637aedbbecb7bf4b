//! Core layer - shared configuration

pub mod config;

pub use config::BotConfig;
