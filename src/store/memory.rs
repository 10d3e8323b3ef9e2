//! In-process settings store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{SettingsStore, StoreError};
use crate::core::GuildId;

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<(GuildId, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.values.read().await.len() }
    pub async fn is_empty(&self) -> bool { self.values.read().await.is_empty() }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str, guild_id: GuildId) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(&(guild_id, key.to_string())).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str, guild_id: GuildId) -> Result<(), StoreError> {
        self.values.write().await.insert((guild_id, key.to_string()), value.to_string());
        Ok(())
    }
}
