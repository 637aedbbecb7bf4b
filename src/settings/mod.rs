//! # Feature: Settings Store
//!
//! Flat string-valued settings for guilds and users over a fixed key set,
//! with typed accessors layered on top of a raw get/set primitive.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Read-modify-write primitive for category toggles
//! - 1.0.0: Initial release with prefix, categories, balances, birthdate and timezone

pub mod clock;
pub mod disk;
mod properties;

pub use clock::{Clock, ManualClock, SystemClock};
pub use disk::{DiskSettingsStore, DEFAULT_CACHE_TTL};

use crate::commands::Category;
use chrono::NaiveDate;
use log::warn;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Prefix used for text commands until a guild configures its own
pub const DEFAULT_PREFIX: &str = "hi!";

/// Storage format of the `birthdate` key
pub const BIRTHDATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Entities and keys
// ============================================================================

/// Which kind of entity a settings record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Community,
    User,
}

impl EntityKind {
    /// Directory under the data root that holds records of this kind
    pub fn directory(&self) -> &'static str {
        match self {
            EntityKind::Community => "guilds",
            EntityKind::User => "users",
        }
    }
}

/// A guild or a user, identified by its platform snowflake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: u64,
}

impl Entity {
    pub fn community(id: u64) -> Self {
        Entity {
            kind: EntityKind::Community,
            id,
        }
    }

    pub fn user(id: u64) -> Self {
        Entity {
            kind: EntityKind::User,
            id,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Community => write!(f, "guild {}", self.id),
            EntityKind::User => write!(f, "user {}", self.id),
        }
    }
}

/// The fixed set of keys a settings record may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Prefix,
    Categories,
    Bank,
    Cash,
    Birthdate,
    Timezone,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::Prefix,
        SettingKey::Categories,
        SettingKey::Bank,
        SettingKey::Cash,
        SettingKey::Birthdate,
        SettingKey::Timezone,
    ];

    /// Name of the key as written to disk
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Prefix => "prefix",
            SettingKey::Categories => "categories",
            SettingKey::Bank => "bank",
            SettingKey::Cash => "cash",
            SettingKey::Birthdate => "birthdate",
            SettingKey::Timezone => "timezone",
        }
    }

    /// Value served when nothing is stored. `None` means "unset" is a valid state.
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            SettingKey::Prefix => Some(DEFAULT_PREFIX),
            SettingKey::Categories | SettingKey::Bank | SettingKey::Cash => Some("0"),
            SettingKey::Birthdate | SettingKey::Timezone => None,
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| StoreError::UnknownKey(s.to_string()))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read settings file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write settings file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown setting key '{0}'")]
    UnknownKey(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Store contract
// ============================================================================

/// Raw key-value access per entity plus the typed accessors commands use.
///
/// Implementations provide `get_raw` and `set_raw`; everything else is built
/// on top of them. All calls may block on I/O.
pub trait SettingsStore: Send + Sync {
    /// Stored value for `key`, or its default. `None` only for keys without a default.
    fn get_raw(&self, entity: Entity, key: SettingKey) -> StoreResult<Option<String>>;

    /// Persist `value` under `key`. Visible to the next `get_raw` in this process.
    fn set_raw(&self, entity: Entity, key: SettingKey, value: &str) -> StoreResult<()>;

    /// Read-modify-write of a single key. Returning `None` from `update` skips the write.
    fn update_raw(
        &self,
        entity: Entity,
        key: SettingKey,
        update: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> StoreResult<()> {
        let current = self.get_raw(entity, key)?;
        match update(current.as_deref()) {
            Some(next) => self.set_raw(entity, key, &next),
            None => Ok(()),
        }
    }

    fn prefix(&self, guild_id: u64) -> StoreResult<String> {
        Ok(self
            .get_raw(Entity::community(guild_id), SettingKey::Prefix)?
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string()))
    }

    fn set_prefix(&self, guild_id: u64, prefix: &str) -> StoreResult<()> {
        self.set_raw(Entity::community(guild_id), SettingKey::Prefix, prefix)
    }

    /// Raw category bitmask. A corrupt value counts as "nothing enabled".
    fn category_mask(&self, guild_id: u64) -> StoreResult<u32> {
        let raw = self.get_raw(Entity::community(guild_id), SettingKey::Categories)?;
        Ok(parse_mask(guild_id, raw.as_deref()))
    }

    fn category_enabled(&self, guild_id: u64, category: Category) -> StoreResult<bool> {
        Ok(category.is_enabled_in(self.category_mask(guild_id)?))
    }

    /// Gated categories that are switched on for the guild
    fn enabled_categories(&self, guild_id: u64) -> StoreResult<Vec<Category>> {
        let mask = self.category_mask(guild_id)?;
        Ok(Category::GATED
            .into_iter()
            .filter(|category| category.is_enabled_in(mask))
            .collect())
    }

    fn set_category_enabled(
        &self,
        guild_id: u64,
        category: Category,
        enabled: bool,
    ) -> StoreResult<()> {
        let Some(bit) = category.mask() else {
            // Ungated categories have no bit to flip
            return Ok(());
        };

        self.update_raw(
            Entity::community(guild_id),
            SettingKey::Categories,
            &mut |current| {
                let mask = parse_mask(guild_id, current);
                let next = if enabled {
                    mask | bit
                } else if mask & bit == bit {
                    mask ^ bit
                } else {
                    mask
                };
                (next != mask).then(|| next.to_string())
            },
        )
    }

    fn bank_amount(&self, user_id: u64) -> StoreResult<i64> {
        let raw = self.get_raw(Entity::user(user_id), SettingKey::Bank)?;
        Ok(parse_amount(raw.as_deref()))
    }

    fn cash_amount(&self, user_id: u64) -> StoreResult<i64> {
        let raw = self.get_raw(Entity::user(user_id), SettingKey::Cash)?;
        Ok(parse_amount(raw.as_deref()))
    }

    fn set_bank_amount(&self, user_id: u64, amount: i64) -> StoreResult<()> {
        self.set_raw(Entity::user(user_id), SettingKey::Bank, &amount.to_string())
    }

    fn set_cash_amount(&self, user_id: u64, amount: i64) -> StoreResult<()> {
        self.set_raw(Entity::user(user_id), SettingKey::Cash, &amount.to_string())
    }

    /// Stored birthdate. Unparsable values read as unset.
    fn birthdate(&self, user_id: u64) -> StoreResult<Option<NaiveDate>> {
        let raw = self.get_raw(Entity::user(user_id), SettingKey::Birthdate)?;
        Ok(raw.and_then(|value| NaiveDate::parse_from_str(&value, BIRTHDATE_FORMAT).ok()))
    }

    fn set_birthdate(&self, user_id: u64, birthdate: NaiveDate) -> StoreResult<()> {
        self.set_raw(
            Entity::user(user_id),
            SettingKey::Birthdate,
            &birthdate.format(BIRTHDATE_FORMAT).to_string(),
        )
    }

    /// Timezone identifier as stored; validity is up to the caller
    fn timezone(&self, user_id: u64) -> StoreResult<Option<String>> {
        self.get_raw(Entity::user(user_id), SettingKey::Timezone)
    }

    fn set_timezone(&self, user_id: u64, timezone: &str) -> StoreResult<()> {
        self.set_raw(Entity::user(user_id), SettingKey::Timezone, timezone)
    }
}

fn parse_mask(guild_id: u64, raw: Option<&str>) -> u32 {
    match raw.map(|value| value.trim().parse::<u32>()) {
        Some(Ok(mask)) => mask,
        Some(Err(e)) => {
            warn!("Ignoring corrupt category mask for guild {guild_id}: {e}");
            0
        }
        None => 0,
    }
}

fn parse_amount(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}
