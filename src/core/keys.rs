//! Setting keys, environment variables, and defaults
//!
//! Centralized registry so the store layout and env surface live in one place.

/// Per-guild setting keys in the store
pub mod settings {
    /// JSON array of rules
    pub const ROLE_CONNECTIONS: &str = "role_connections";
    /// JSON array of role ids exempt from processing
    pub const PROTECTED_ROLES: &str = "protected_roles";
}

/// Environment variables
pub mod env {
    pub const ROOT: &str = "ROLECONNECT_ROOT";
    pub const LOG_JSON: &str = "ROLECONNECT_LOG_JSON";
    pub const SWEEP_SECS: &str = "ROLECONNECT_SWEEP_SECS";
    pub const SWEEP_ON_START: &str = "ROLECONNECT_SWEEP_ON_START";
}

/// File store layout
pub mod files {
    pub const APP_DIR: &str = "roleconnect";
    pub const SETTINGS_FILE: &str = "settings.json";
}

/// Reconciliation sweep period
pub const DEFAULT_SWEEP_SECS: u64 = 300;

/// Prefix of the audit-log reason attached to every role mutation
pub const REASON_PREFIX: &str = "Role connection";
