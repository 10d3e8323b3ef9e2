//! Engine configuration - passed from the host

use std::time::Duration;

use crate::core::keys::{env, DEFAULT_SWEEP_SECS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Period between reconciliation sweeps
    pub sweep_interval: Duration,
    /// Run the first sweep immediately instead of after one interval
    pub sweep_on_start: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { sweep_interval: Duration::from_secs(DEFAULT_SWEEP_SECS), sweep_on_start: true }
    }
}

impl EngineConfig {
    pub fn new() -> Self { Self::default() }

    /// Zero is ignored.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.sweep_interval = interval;
        }
        self
    }

    pub fn with_sweep_on_start(mut self, on: bool) -> Self { self.sweep_on_start = on; self }

    /// Defaults overlaid with `ROLECONNECT_SWEEP_SECS` / `ROLECONNECT_SWEEP_ON_START`.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(env::SWEEP_SECS).filter(|s| !s.trim().is_empty()) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.sweep_interval = Duration::from_secs(secs),
                _ => tracing::warn!("ignoring invalid {}={:?}", env::SWEEP_SECS, raw),
            }
        }
        if let Some(raw) = lookup(env::SWEEP_ON_START).filter(|s| !s.trim().is_empty()) {
            match parse_flag(&raw) {
                Some(on) => self.sweep_on_start = on,
                None => tracing::warn!("ignoring invalid {}={:?}", env::SWEEP_ON_START, raw),
            }
        }
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(vars: &[(&str, &str)]) -> EngineConfig {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EngineConfig::default().overlay(|key| vars.get(key).cloned())
    }

    #[test]
    fn default_sweeps_every_five_minutes() {
        let config = EngineConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert!(config.sweep_on_start);
    }

    #[test]
    fn builder_rejects_zero_interval() {
        let config = EngineConfig::new().with_sweep_interval(Duration::ZERO).with_sweep_on_start(false);
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert!(!config.sweep_on_start);
    }

    #[test]
    fn env_overlay_applies_valid_values() {
        let config = overlay(&[(env::SWEEP_SECS, "60"), (env::SWEEP_ON_START, "no")]);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert!(!config.sweep_on_start);
    }

    #[test]
    fn env_overlay_ignores_invalid_values() {
        let config = overlay(&[(env::SWEEP_SECS, "0"), (env::SWEEP_ON_START, "maybe")]);
        assert_eq!(config, EngineConfig::default());
        let config = overlay(&[(env::SWEEP_SECS, "five")]);
        assert_eq!(config, EngineConfig::default());
    }
}
