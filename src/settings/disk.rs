//! # Feature: Disk Settings Store
//!
//! One `config.properties` file per entity under `<root>/guilds/<id>/` or
//! `<root>/users/<id>/`, fronted by a per-kind in-memory cache with a fixed TTL.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Per-entity write serialization, temp-file-and-rename writes
//! - 1.0.0: Initial release with 60 second record cache
//!
//! A write refreshes the cached copy of the whole record but keeps the expiry
//! stamped by the load it started from, so a record is never served more than
//! one TTL after it was last read from disk. The caches have no capacity bound.

use super::properties::{self, SettingsRecord};
use super::{Clock, Entity, EntityKind, SettingKey, SettingsStore, StoreError, StoreResult, SystemClock};
use dashmap::DashMap;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// How long a loaded record is served from memory
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

const RECORD_FILE_NAME: &str = "config.properties";

#[derive(Debug, Clone)]
struct CachedRecord {
    record: SettingsRecord,
    expires_at: Instant,
}

pub struct DiskSettingsStore {
    root: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    guild_cache: DashMap<u64, CachedRecord>,
    user_cache: DashMap<u64, CachedRecord>,
    write_locks: DashMap<Entity, Arc<Mutex<()>>>,
}

impl DiskSettingsStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_ttl(root, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl<P: AsRef<Path>>(root: P, ttl: Duration) -> Self {
        Self::with_clock(root, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock<P: AsRef<Path>>(root: P, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        DiskSettingsStore {
            root: root.as_ref().to_path_buf(),
            ttl,
            clock,
            guild_cache: DashMap::new(),
            user_cache: DashMap::new(),
            write_locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the record file for an entity
    pub fn record_path(&self, entity: Entity) -> PathBuf {
        self.root
            .join(entity.kind.directory())
            .join(entity.id.to_string())
            .join(RECORD_FILE_NAME)
    }

    fn cache(&self, kind: EntityKind) -> &DashMap<u64, CachedRecord> {
        match kind {
            EntityKind::Community => &self.guild_cache,
            EntityKind::User => &self.user_cache,
        }
    }

    /// Cached record if still fresh, otherwise a fresh load that replaces the cache entry
    fn fetch(&self, entity: Entity) -> StoreResult<CachedRecord> {
        let now = self.clock.now();
        let cache = self.cache(entity.kind);

        if let Some(entry) = cache.get(&entity.id) {
            if now < entry.expires_at {
                return Ok(entry.clone());
            }
        }

        let entry = CachedRecord {
            record: self.load(entity)?,
            expires_at: now + self.ttl,
        };
        cache.insert(entity.id, entry.clone());
        Ok(entry)
    }

    fn load(&self, entity: Entity) -> StoreResult<SettingsRecord> {
        let path = self.record_path(entity);
        match fs::read(&path) {
            Ok(bytes) => Ok(properties::parse(&String::from_utf8_lossy(&bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SettingsRecord::new()),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn persist(&self, entity: Entity, record: &SettingsRecord) -> StoreResult<()> {
        let path = self.record_path(entity);
        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(write_err)?;
                debug!("Created the initial file structure for {entity}");
            }
        }

        let staging = path.with_extension("properties.tmp");
        fs::write(&staging, properties::serialize(entity.id, record)).map_err(write_err)?;
        fs::rename(&staging, &path).map_err(write_err)?;
        Ok(())
    }

    fn write_lock(&self, entity: Entity) -> Arc<Mutex<()>> {
        self.write_locks.entry(entity).or_default().clone()
    }

    fn write_with(
        &self,
        entity: Entity,
        key: SettingKey,
        update: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> StoreResult<()> {
        let lock = self.write_lock(entity);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entry = self.fetch(entity)?;
        let current = entry
            .record
            .get(key.as_str())
            .map(String::as_str)
            .or(key.default_value());
        let Some(value) = update(current) else {
            return Ok(());
        };

        entry.record.insert(key.as_str().to_string(), value);
        self.persist(entity, &entry.record)?;
        self.cache(entity.kind).insert(entity.id, entry);
        debug!("Stored {key} for {entity}");
        Ok(())
    }
}

impl SettingsStore for DiskSettingsStore {
    fn get_raw(&self, entity: Entity, key: SettingKey) -> StoreResult<Option<String>> {
        let entry = self.fetch(entity)?;
        Ok(entry
            .record
            .get(key.as_str())
            .cloned()
            .or_else(|| key.default_value().map(str::to_string)))
    }

    fn set_raw(&self, entity: Entity, key: SettingKey, value: &str) -> StoreResult<()> {
        self.write_with(entity, key, &mut |_| Some(value.to_string()))
    }

    fn update_raw(
        &self,
        entity: Entity,
        key: SettingKey,
        update: &mut dyn FnMut(Option<&str>) -> Option<String>,
    ) -> StoreResult<()> {
        self.write_with(entity, key, update)
    }
}
