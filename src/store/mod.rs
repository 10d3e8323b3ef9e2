//! Settings store: per-guild key → JSON string persistence
//!
//! The engine keeps two keys per guild (see `core::keys::settings`). Values
//! are opaque JSON text; decoding happens in `connections`.

mod memory;
#[cfg(feature = "native")]
mod file;

pub use memory::MemoryStore;
#[cfg(feature = "native")]
pub use file::FileStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::GuildId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store backend: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str, guild_id: GuildId) -> Result<Option<String>, StoreError>;
    async fn set_setting(&self, key: &str, value: &str, guild_id: GuildId) -> Result<(), StoreError>;
}
