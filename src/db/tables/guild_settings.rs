//! Per-guild settings operations.
//!
//! One row per guild, created implicitly on first write. Every write is a
//! single-field upsert: `ON CONFLICT(guild_id) DO UPDATE` touches only the
//! written column, so concurrent writers to different fields never clobber
//! each other and a guild never gets a duplicate row.

use chrono::Utc;
use rusqlite::{OptionalExtension, Result as SqliteResult};

use super::super::Database;
use crate::config::DEFAULT_MODEL;

impl Database {
    /// Get the stored API key for a guild, or None if setup never completed.
    pub fn get_api_key(&self, guild_id: u64) -> SqliteResult<Option<String>> {
        if let Some(cached) = self.cache.get_api_key(guild_id) {
            return Ok(cached);
        }

        let conn = self.conn()?;
        let key: Option<String> = conn
            .query_row(
                "SELECT api_key FROM guild_settings WHERE guild_id = ?1",
                [guild_id as i64],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        self.cache.set_api_key(guild_id, key.clone());
        Ok(key)
    }

    pub fn set_api_key(&self, guild_id: u64, api_key: &str) -> SqliteResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO guild_settings (guild_id, api_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(guild_id) DO UPDATE SET
                api_key = excluded.api_key,
                updated_at = excluded.updated_at",
            rusqlite::params![guild_id as i64, api_key, &now],
        )?;
        self.cache.invalidate_guild(guild_id);
        Ok(())
    }

    /// Get the selected model for a guild. Absence resolves to the baseline
    /// default at read time; this never writes.
    pub fn get_model(&self, guild_id: u64) -> SqliteResult<String> {
        Ok(self
            .get_model_if_set(guild_id)?
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()))
    }

    /// Raw stored model, or None if the guild never picked one.
    pub fn get_model_if_set(&self, guild_id: u64) -> SqliteResult<Option<String>> {
        if let Some(cached) = self.cache.get_model(guild_id) {
            return Ok(cached);
        }

        let conn = self.conn()?;
        let model: Option<String> = conn
            .query_row(
                "SELECT current_model FROM guild_settings WHERE guild_id = ?1",
                [guild_id as i64],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        self.cache.set_model(guild_id, model.clone());
        Ok(model)
    }

    pub fn set_model(&self, guild_id: u64, model: &str) -> SqliteResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO guild_settings (guild_id, current_model, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(guild_id) DO UPDATE SET
                current_model = excluded.current_model,
                updated_at = excluded.updated_at",
            rusqlite::params![guild_id as i64, model, &now],
        )?;
        self.cache.invalidate_guild(guild_id);
        Ok(())
    }

    /// Reference to the most recently rendered model-selector message, if any.
    pub fn get_selector_ref(&self, guild_id: u64) -> SqliteResult<Option<(u64, u64)>> {
        let conn = self.conn()?;
        let result: Option<(Option<i64>, Option<i64>)> = conn
            .query_row(
                "SELECT model_message_id, model_channel_id
                 FROM guild_settings WHERE guild_id = ?1",
                [guild_id as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match result {
            Some((Some(message_id), Some(channel_id))) => {
                Some((message_id as u64, channel_id as u64))
            }
            _ => None,
        })
    }

    pub fn set_selector_ref(
        &self,
        guild_id: u64,
        message_id: u64,
        channel_id: u64,
    ) -> SqliteResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO guild_settings (guild_id, model_message_id, model_channel_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(guild_id) DO UPDATE SET
                model_message_id = excluded.model_message_id,
                model_channel_id = excluded.model_channel_id,
                updated_at = excluded.updated_at",
            rusqlite::params![guild_id as i64, message_id as i64, channel_id as i64, &now],
        )?;
        self.cache.invalidate_guild(guild_id);
        Ok(())
    }

    /// Whether the onboarding message was already delivered to this guild.
    pub fn welcome_sent(&self, guild_id: u64) -> SqliteResult<bool> {
        let conn = self.conn()?;
        let sent: Option<i64> = conn
            .query_row(
                "SELECT welcome_sent FROM guild_settings WHERE guild_id = ?1",
                [guild_id as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sent.unwrap_or(0) != 0)
    }

    /// Record a confirmed onboarding delivery. Transitions false → true once;
    /// there is no path back.
    pub fn mark_welcome_sent(&self, guild_id: u64) -> SqliteResult<()> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO guild_settings (guild_id, welcome_sent, created_at, updated_at)
             VALUES (?1, 1, ?2, ?2)
             ON CONFLICT(guild_id) DO UPDATE SET
                welcome_sent = 1,
                updated_at = excluded.updated_at",
            rusqlite::params![guild_id as i64, &now],
        )?;
        self.cache.invalidate_guild(guild_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DEFAULT_MODEL;
    use crate::db::Database;

    fn db() -> Database {
        Database::new(":memory:").expect("in-memory db")
    }

    #[test]
    fn model_defaults_when_no_record_exists() {
        let db = db();
        assert_eq!(db.get_model(1).unwrap(), DEFAULT_MODEL);
        assert_eq!(db.get_model_if_set(1).unwrap(), None);
    }

    #[test]
    fn set_model_then_get_model_roundtrips() {
        let db = db();

        // No prior record
        db.set_model(7, "deepseek-r1").unwrap();
        assert_eq!(db.get_model(7).unwrap(), "deepseek-r1");

        // Existing record, overwrite
        db.set_model(7, "deepseek-chat").unwrap();
        assert_eq!(db.get_model(7).unwrap(), "deepseek-chat");
    }

    #[test]
    fn upsert_preserves_sibling_fields() {
        let db = db();
        db.set_api_key(42, "sk-test").unwrap();
        db.set_model(42, "deepseek-r1").unwrap();
        db.set_selector_ref(42, 100, 200).unwrap();

        // Writing one field must not wipe the others (the INSERT OR REPLACE
        // trap this schema exists to avoid).
        db.set_model(42, "deepseek-chat").unwrap();
        assert_eq!(db.get_api_key(42).unwrap().as_deref(), Some("sk-test"));
        assert_eq!(db.get_selector_ref(42).unwrap(), Some((100, 200)));

        db.set_api_key(42, "sk-other").unwrap();
        assert_eq!(db.get_model(42).unwrap(), "deepseek-chat");
    }

    #[test]
    fn selector_ref_absent_until_set() {
        let db = db();
        assert_eq!(db.get_selector_ref(9).unwrap(), None);

        db.set_selector_ref(9, 555, 777).unwrap();
        assert_eq!(db.get_selector_ref(9).unwrap(), Some((555, 777)));

        // Replacement points at the newest message
        db.set_selector_ref(9, 556, 777).unwrap();
        assert_eq!(db.get_selector_ref(9).unwrap(), Some((556, 777)));
    }

    #[test]
    fn welcome_sent_is_monotonic() {
        let db = db();
        assert!(!db.welcome_sent(3).unwrap());

        db.mark_welcome_sent(3).unwrap();
        assert!(db.welcome_sent(3).unwrap());

        // Marking again is a no-op, and unrelated writes never reset it
        db.mark_welcome_sent(3).unwrap();
        db.set_model(3, "deepseek-r1").unwrap();
        assert!(db.welcome_sent(3).unwrap());
    }

    #[test]
    fn api_key_absent_until_set() {
        let db = db();
        assert_eq!(db.get_api_key(12).unwrap(), None);

        db.set_api_key(12, "sk-live").unwrap();
        assert_eq!(db.get_api_key(12).unwrap().as_deref(), Some("sk-live"));
    }

    #[test]
    fn cache_sees_writes_immediately() {
        let db = db();
        // Prime the cache with the absent state, then write
        assert_eq!(db.get_api_key(5).unwrap(), None);
        db.set_api_key(5, "sk-1").unwrap();
        assert_eq!(db.get_api_key(5).unwrap().as_deref(), Some("sk-1"));

        assert_eq!(db.get_model(5).unwrap(), DEFAULT_MODEL);
        db.set_model(5, "deepseek-r1").unwrap();
        assert_eq!(db.get_model(5).unwrap(), "deepseek-r1");
    }

    #[test]
    fn read_errors_surface_instead_of_reading_as_absent() {
        let db = db();
        db.conn()
            .unwrap()
            .execute_batch("DROP TABLE guild_settings")
            .unwrap();

        // A broken store must not look like "no record yet".
        assert!(db.get_api_key(1).is_err());
        assert!(db.get_model_if_set(1).is_err());
        assert!(db.get_selector_ref(1).is_err());
        assert!(db.welcome_sent(1).is_err());
    }

    #[test]
    fn persists_across_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new(path).unwrap();
            db.set_api_key(8, "sk-disk").unwrap();
            db.set_model(8, "deepseek-r1").unwrap();
        }

        let db = Database::new(path).unwrap();
        assert_eq!(db.get_api_key(8).unwrap().as_deref(), Some("sk-disk"));
        assert_eq!(db.get_model(8).unwrap(), "deepseek-r1");
    }
}
