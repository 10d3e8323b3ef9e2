//! Connection Tests: authoring operations, persistence, and cache loading
//!
//! Covers:
//! 1. Id assignment (max + 1, reuse after full deletion)
//! 2. Stored JSON shape and round-trip
//! 3. Malformed / unreadable data degrades to empty
//! 4. Toggle, logic, protected-role edits persist
//! 5. Write failures surface to the caller
//! 6. File store end-to-end

use async_trait::async_trait;
use once_cell::sync::Lazy;
use roleconnect::core::keys::settings;
use roleconnect::{
    Action, Condition, ConnectionError, ConnectionManager, FileStore, GuildId, Logic, MemoryStore, RoleId, Rule,
    RuleId, SettingsStore, StoreError,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

const GUILD: GuildId = GuildId(42);
const DONOR: u64 = 10;
const VIP: u64 = 20;
const MUTED: u64 = 30;
const STAFF: u64 = 99;

fn memory_manager() -> (Arc<MemoryStore>, ConnectionManager) {
    let store = Arc::new(MemoryStore::new());
    let manager = ConnectionManager::new(store.clone());
    (store, manager)
}

async fn add_vip_rule(manager: &ConnectionManager, guild: GuildId) -> RuleId {
    manager
        .add_connection(guild, RoleId(VIP), Action::Give, vec![Condition::has(DONOR)], Logic::And)
        .await
        .expect("add")
}

/// Store that can't be written and optionally can't be read
struct BrokenStore {
    reads_fail: bool,
}

#[async_trait]
impl SettingsStore for BrokenStore {
    async fn get_setting(&self, _key: &str, _guild_id: GuildId) -> Result<Option<String>, StoreError> {
        if self.reads_fail {
            Err(StoreError::Backend("read refused".into()))
        } else {
            Ok(None)
        }
    }

    async fn set_setting(&self, _key: &str, _value: &str, _guild_id: GuildId) -> Result<(), StoreError> {
        Err(StoreError::Backend("write refused".into()))
    }
}

#[tokio::test]
async fn ids_increase_from_one() {
    let (_store, manager) = memory_manager();
    let ids = [
        add_vip_rule(&manager, GUILD).await,
        add_vip_rule(&manager, GUILD).await,
        add_vip_rule(&manager, GUILD).await,
    ];
    assert_eq!(ids, [1, 2, 3]);

    // Other guilds have their own sequence
    assert_eq!(add_vip_rule(&manager, GuildId(7)).await, 1);
}

#[tokio::test]
async fn ids_follow_max_and_reset_when_emptied() {
    let (_store, manager) = memory_manager();
    for _ in 0..3 {
        add_vip_rule(&manager, GUILD).await;
    }

    // Removing a middle rule does not free its id for the next add
    assert!(manager.remove_connection(GUILD, 2).await.unwrap());
    assert_eq!(add_vip_rule(&manager, GUILD).await, 4);

    // Removing the highest does
    assert!(manager.remove_connection(GUILD, 4).await.unwrap());
    assert_eq!(add_vip_rule(&manager, GUILD).await, 4);

    for id in [1, 3, 4] {
        assert!(manager.remove_connection(GUILD, id).await.unwrap());
    }
    assert!(manager.connections(GUILD).await.is_empty());
    assert_eq!(add_vip_rule(&manager, GUILD).await, 1);
}

#[tokio::test]
async fn stored_shape_matches_wire_format() {
    let (store, manager) = memory_manager();
    manager
        .add_connection(GUILD, RoleId(VIP), Action::Remove, vec![Condition::has(DONOR), Condition::lacks(MUTED)], Logic::Or)
        .await
        .unwrap();

    let raw = store.get_setting(settings::ROLE_CONNECTIONS, GUILD).await.unwrap().expect("stored");
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        value,
        json!([{
            "id": 1,
            "target_role_id": VIP,
            "action": "remove",
            "conditions": [
                {"type": "has", "role_id": DONOR},
                {"type": "doesnt_have", "role_id": MUTED}
            ],
            "logic": "OR",
            "enabled": true
        }])
    );
}

#[tokio::test]
async fn rules_round_trip_through_the_store() {
    let (store, manager) = memory_manager();
    manager
        .add_connection(GUILD, RoleId(VIP), Action::Give, vec![Condition::has(DONOR), Condition::lacks(MUTED)], Logic::Or)
        .await
        .unwrap();
    manager.add_connection(GUILD, RoleId(MUTED), Action::Remove, vec![Condition::has(STAFF)], Logic::And).await.unwrap();
    manager.toggle_connection(GUILD, 2).await.unwrap();
    let written = manager.connections(GUILD).await;

    // A fresh manager sees exactly what was written, guild id included
    let reader = ConnectionManager::new(store);
    let loaded = reader.load_connections(GUILD).await;
    assert_eq!(loaded, written);
    assert_eq!(
        loaded[0],
        Rule::new(1, GUILD, RoleId(VIP), Action::Give)
            .with_conditions(vec![Condition::has(DONOR), Condition::lacks(MUTED)])
            .with_logic(Logic::Or)
    );
    assert!(!loaded[1].enabled);
}

#[tokio::test]
async fn malformed_data_loads_as_empty() {
    let (store, manager) = memory_manager();
    store.set_setting(settings::ROLE_CONNECTIONS, "{not json", GUILD).await.unwrap();
    store.set_setting(settings::PROTECTED_ROLES, r#"["staff"]"#, GUILD).await.unwrap();

    assert!(manager.load_connections(GUILD).await.is_empty());
    assert!(manager.load_protected_roles(GUILD).await.is_empty());

    // Wrong element shape is malformed too
    store.set_setting(settings::ROLE_CONNECTIONS, r#"[{"id": 1}]"#, GUILD).await.unwrap();
    assert!(manager.load_connections(GUILD).await.is_empty());
}

#[tokio::test]
async fn ids_beyond_u32_load_and_extend() {
    let (store, manager) = memory_manager();
    let stored = json!([
        {"id": 1, "target_role_id": VIP, "action": "give", "conditions": [{"type": "has", "role_id": DONOR}]},
        {"id": 4_294_967_296u64, "target_role_id": VIP, "action": "remove", "conditions": [{"type": "has", "role_id": MUTED}]}
    ]);
    store.set_setting(settings::ROLE_CONNECTIONS, &stored.to_string(), GUILD).await.unwrap();

    let ids: Vec<RuleId> = manager.load_connections(GUILD).await.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 4_294_967_296]);
    assert_eq!(add_vip_rule(&manager, GUILD).await, 4_294_967_297);
}

#[tokio::test]
async fn exhausted_ids_fail_without_writing() {
    let (store, manager) = memory_manager();
    let stored = json!([
        {"id": RuleId::MAX, "target_role_id": VIP, "action": "give", "conditions": [{"type": "has", "role_id": DONOR}]}
    ])
    .to_string();
    store.set_setting(settings::ROLE_CONNECTIONS, &stored, GUILD).await.unwrap();

    let err = manager
        .add_connection(GUILD, RoleId(VIP), Action::Give, vec![Condition::has(MUTED)], Logic::And)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::IdsExhausted(g) if g == GUILD));

    // Existing rule untouched, store unchanged
    assert_eq!(manager.connections(GUILD).await.len(), 1);
    assert_eq!(store.get_setting(settings::ROLE_CONNECTIONS, GUILD).await.unwrap(), Some(stored));
}

#[tokio::test]
async fn unreadable_store_loads_as_empty() {
    let manager = ConnectionManager::new(Arc::new(BrokenStore { reads_fail: true }));
    assert!(manager.load_connections(GUILD).await.is_empty());
    assert!(manager.load_protected_roles(GUILD).await.is_empty());
    assert!(manager.guild_rules(GUILD).await.connections.is_empty());
}

#[tokio::test]
async fn failed_write_surfaces_to_caller() {
    let manager = ConnectionManager::new(Arc::new(BrokenStore { reads_fail: false }));
    let err = manager
        .add_connection(GUILD, RoleId(VIP), Action::Give, vec![Condition::has(DONOR)], Logic::And)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::Store(StoreError::Backend(_))));
    assert!(manager.add_protected_role(GUILD, RoleId(STAFF)).await.is_err());

    // Nothing was cached as if it had been saved
    assert!(manager.connections(GUILD).await.is_empty());
}

#[tokio::test]
async fn toggle_and_logic_persist() {
    let (store, manager) = memory_manager();
    let id = add_vip_rule(&manager, GUILD).await;

    assert_eq!(manager.toggle_connection(GUILD, id).await.unwrap(), Some(false));
    assert!(manager.update_connection_logic(GUILD, id, Logic::Or).await.unwrap());

    let reader = ConnectionManager::new(store.clone());
    let rule = reader.load_connections(GUILD).await.remove(0);
    assert!(!rule.enabled);
    assert_eq!(rule.logic, Logic::Or);

    assert_eq!(manager.toggle_connection(GUILD, id).await.unwrap(), Some(true));
    assert!(reader.load_connections(GUILD).await[0].enabled);
}

#[tokio::test]
async fn unknown_ids_change_nothing() {
    let (store, manager) = memory_manager();
    add_vip_rule(&manager, GUILD).await;
    let before = store.get_setting(settings::ROLE_CONNECTIONS, GUILD).await.unwrap();

    assert!(!manager.remove_connection(GUILD, 9).await.unwrap());
    assert_eq!(manager.toggle_connection(GUILD, 9).await.unwrap(), None);
    assert!(!manager.update_connection_logic(GUILD, 9, Logic::Or).await.unwrap());

    assert_eq!(store.get_setting(settings::ROLE_CONNECTIONS, GUILD).await.unwrap(), before);
}

#[tokio::test]
async fn protected_roles_are_an_idempotent_set() {
    let (store, manager) = memory_manager();

    assert!(manager.add_protected_role(GUILD, RoleId(STAFF)).await.unwrap());
    assert!(!manager.add_protected_role(GUILD, RoleId(STAFF)).await.unwrap());
    assert!(manager.add_protected_role(GUILD, RoleId(MUTED)).await.unwrap());
    assert_eq!(
        store.get_setting(settings::PROTECTED_ROLES, GUILD).await.unwrap().as_deref(),
        Some("[30,99]")
    );

    assert!(manager.remove_protected_role(GUILD, RoleId(STAFF)).await.unwrap());
    assert!(!manager.remove_protected_role(GUILD, RoleId(STAFF)).await.unwrap());
    let protected: Vec<RoleId> = manager.protected_roles(GUILD).await.into_iter().collect();
    assert_eq!(protected, vec![RoleId(MUTED)]);
}

#[tokio::test]
async fn cache_is_populated_lazily_and_replaced_on_load() {
    let (store, manager) = memory_manager();
    assert!(!manager.is_cached(GUILD).await);
    assert!(manager.connections(GUILD).await.is_empty());
    assert!(manager.is_cached(GUILD).await);

    // Out-of-band write is invisible until the next load
    let other = ConnectionManager::new(store);
    add_vip_rule(&other, GUILD).await;
    assert!(manager.connections(GUILD).await.is_empty());
    assert_eq!(manager.load_connections(GUILD).await.len(), 1);
    assert_eq!(manager.connections(GUILD).await.len(), 1);
}

#[tokio::test]
async fn file_store_persists_across_managers() {
    let dir = TempDir::new().expect("tempdir");
    {
        let manager = ConnectionManager::new(Arc::new(FileStore::at(dir.path())));
        add_vip_rule(&manager, GUILD).await;
        manager.add_protected_role(GUILD, RoleId(STAFF)).await.unwrap();
    }

    let manager = ConnectionManager::new(Arc::new(FileStore::at(dir.path())));
    let rules = manager.reload(GUILD).await;
    assert_eq!(rules.connections.len(), 1);
    assert_eq!(rules.connections[0].guild_id, GUILD);
    assert!(rules.protected.contains(&RoleId(STAFF)));
}

#[tokio::test]
async fn file_store_root_from_env() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    std::env::set_var("ROLECONNECT_ROOT", dir.path());

    let store = FileStore::open_default();
    assert_eq!(store.root(), dir.path());
    store.set_setting(settings::PROTECTED_ROLES, "[1]", GUILD).await.unwrap();
    assert!(dir.path().join("42").join("settings.json").exists());

    std::env::remove_var("ROLECONNECT_ROOT");
}
