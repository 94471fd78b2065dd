//! In-memory cache layer for hot-path database queries.
//!
//! Uses moka::sync::Cache to avoid hitting SQLite on every inbound event for
//! nearly-static per-guild data (API key, selected model). Every write to a
//! guild invalidates that guild's entries, so write-then-read stays consistent.

use std::time::Duration;

use moka::sync::Cache;

/// TTL for per-guild config data
const CONFIG_TTL: Duration = Duration::from_secs(300); // 5 min

pub struct DbCache {
    /// guild_id → stored API key (None cached too: "known absent")
    api_keys: Cache<u64, Option<String>>,
    /// guild_id → raw stored model (pre-default resolution)
    models: Cache<u64, Option<String>>,
}

impl DbCache {
    pub fn new() -> Self {
        Self {
            api_keys: Cache::builder()
                .time_to_live(CONFIG_TTL)
                .max_capacity(1024)
                .build(),
            models: Cache::builder()
                .time_to_live(CONFIG_TTL)
                .max_capacity(1024)
                .build(),
        }
    }

    pub fn get_api_key(&self, guild_id: u64) -> Option<Option<String>> {
        self.api_keys.get(&guild_id)
    }

    pub fn set_api_key(&self, guild_id: u64, key: Option<String>) {
        self.api_keys.insert(guild_id, key);
    }

    pub fn get_model(&self, guild_id: u64) -> Option<Option<String>> {
        self.models.get(&guild_id)
    }

    pub fn set_model(&self, guild_id: u64, model: Option<String>) {
        self.models.insert(guild_id, model);
    }

    /// Drop all cached entries for a guild after any write to its row.
    pub fn invalidate_guild(&self, guild_id: u64) {
        self.api_keys.invalidate(&guild_id);
        self.models.invalidate(&guild_id);
    }
}
