//! Selector-message lifecycle: at most one live model-selection message per
//! guild. Rendering a new selector first attempts to delete the previous one
//! (best-effort), then persists the fresh reference. A button selection edits
//! the existing message in place, so the stored reference stays valid.

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::Database;
use crate::error::RelayError;

use super::dispatch::ReplySink;

/// Outbound message operations the selector lifecycle needs from the chat
/// gateway. Implemented over serenity in the Discord channel and mocked in
/// tests.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a fresh selector message highlighting `current_model`.
    /// Returns the new message id.
    async fn create_selector(&self, channel_id: u64, current_model: &str) -> Result<u64, String>;

    /// Re-render an existing selector in place with a new highlighted model.
    async fn update_selector(
        &self,
        channel_id: u64,
        message_id: u64,
        model: &str,
    ) -> Result<(), String>;

    /// Delete a message. Returns `Ok(false)` when it was already gone,
    /// which is not an error.
    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<bool, String>;
}

pub struct SelectorManager {
    db: Arc<Database>,
}

impl SelectorManager {
    pub fn new(db: Arc<Database>) -> Self {
        SelectorManager { db }
    }

    /// Replace the guild's selector: delete the stale one if a reference is
    /// stored, render a new one, persist the new reference.
    pub async fn render(
        &self,
        gateway: &dyn ChatGateway,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<(), RelayError> {
        if let Some((old_message_id, old_channel_id)) = self.db.get_selector_ref(guild_id)? {
            match gateway.delete_message(old_channel_id, old_message_id).await {
                Ok(true) => {
                    log::debug!("Deleted stale selector message {} in guild {}", old_message_id, guild_id)
                }
                Ok(false) => {}
                Err(e) => log::warn!(
                    "Failed to delete stale selector message {} in guild {}: {}",
                    old_message_id,
                    guild_id,
                    e
                ),
            }
        }

        let current_model = self.db.get_model(guild_id)?;
        let message_id = gateway
            .create_selector(channel_id, &current_model)
            .await
            .map_err(RelayError::Unknown)?;

        self.db.set_selector_ref(guild_id, message_id, channel_id)?;
        Ok(())
    }

    /// Handle a selection button press: persist the choice, acknowledge it to
    /// the actor privately, and re-render the same message in place.
    pub async fn choose(
        &self,
        gateway: &dyn ChatGateway,
        sink: &dyn ReplySink,
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
        model: &str,
    ) -> Result<(), RelayError> {
        self.db.set_model(guild_id, model)?;

        if let Err(e) = sink.reply_private(&format!("Model changed to {}", model)).await {
            log::warn!("Failed to acknowledge model choice in guild {}: {}", guild_id, e);
        }

        if let Err(e) = gateway.update_selector(channel_id, message_id, model).await {
            log::warn!("Failed to re-render selector {} in guild {}: {}", message_id, guild_id, e);
        }
        Ok(())
    }
}
