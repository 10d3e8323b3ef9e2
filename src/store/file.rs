//! JSON file settings store: `<root>/<guild_id>/settings.json`

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{SettingsStore, StoreError};
use crate::core::keys::{env, files};
use crate::core::GuildId;

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serializes read-modify-write of the per-guild file.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), write_lock: Mutex::new(()) }
    }

    /// Resolve the root from `ROLECONNECT_ROOT`, else the local data dir.
    pub fn open_default() -> Self {
        Self::at(default_root())
    }

    pub fn root(&self) -> &Path { &self.root }

    fn guild_file(&self, guild_id: GuildId) -> PathBuf {
        self.root.join(guild_id.to_string()).join(files::SETTINGS_FILE)
    }

    async fn read_map(&self, guild_id: GuildId) -> Result<Map<String, Value>, StoreError> {
        let path = self.guild_file(guild_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Backend(format!("{}: expected object, found {}", path.display(), kind_of(&other)))),
        }
    }
}

#[async_trait]
impl SettingsStore for FileStore {
    async fn get_setting(&self, key: &str, guild_id: GuildId) -> Result<Option<String>, StoreError> {
        let map = self.read_map(guild_id).await?;
        match map.get(key) {
            None => Ok(None),
            Some(Value::String(raw)) => Ok(Some(raw.clone())),
            Some(other) => Err(StoreError::Backend(format!(
                "{}: {} holds a {}, expected a string",
                self.guild_file(guild_id).display(),
                key,
                kind_of(other)
            ))),
        }
    }

    async fn set_setting(&self, key: &str, value: &str, guild_id: GuildId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_map(guild_id).await?;
        map.insert(key.to_string(), Value::String(value.to_string()));

        let path = self.guild_file(guild_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(&Value::Object(map))?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn default_root() -> PathBuf {
    std::env::var(env::ROOT)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join(files::APP_DIR))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_reads_as_unset() {
        let dir = TempDir::new().expect("tempdir");
        let store = FileStore::at(dir.path());
        assert_eq!(store.get_setting("role_connections", GuildId(5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = FileStore::at(dir.path());
            store.set_setting("role_connections", "[]", GuildId(5)).await.unwrap();
            store.set_setting("protected_roles", "[7,8]", GuildId(5)).await.unwrap();
        }
        let store = FileStore::at(dir.path());
        assert_eq!(store.get_setting("role_connections", GuildId(5)).await.unwrap().as_deref(), Some("[]"));
        assert_eq!(store.get_setting("protected_roles", GuildId(5)).await.unwrap().as_deref(), Some("[7,8]"));
        assert!(dir.path().join("5").join("settings.json").exists());
        assert!(!dir.path().join("5").join("settings.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let guild_dir = dir.path().join("6");
        std::fs::create_dir_all(&guild_dir).unwrap();
        std::fs::write(guild_dir.join("settings.json"), "[1,2]").unwrap();

        let store = FileStore::at(dir.path());
        assert!(matches!(store.get_setting("k", GuildId(6)).await, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn non_string_value_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let guild_dir = dir.path().join("8");
        std::fs::create_dir_all(&guild_dir).unwrap();
        std::fs::write(guild_dir.join("settings.json"), r#"{"role_connections": [], "protected_roles": "[1]"}"#).unwrap();

        let store = FileStore::at(dir.path());
        assert!(matches!(store.get_setting("role_connections", GuildId(8)).await, Err(StoreError::Backend(_))));
        assert_eq!(store.get_setting("protected_roles", GuildId(8)).await.unwrap().as_deref(), Some("[1]"));
        assert_eq!(store.get_setting("missing", GuildId(8)).await.unwrap(), None);
    }
}
