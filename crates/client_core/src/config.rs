use std::{collections::HashMap, fs, path::Path, time::Duration};

use serde::Deserialize;
use shared::domain::UserId;

pub const DEFAULT_SETTINGS_FILE: &str = "replica.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub current_user_id: Option<UserId>,
    pub typing_timeout_ms: u64,
    pub delivery_flush_interval_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/replica.db".into(),
            current_user_id: None,
            typing_timeout_ms: 15_000,
            delivery_flush_interval_ms: 1_000,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    pub fn delivery_flush_interval(&self) -> Duration {
        Duration::from_millis(self.delivery_flush_interval_ms)
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(DEFAULT_SETTINGS_FILE)
}

/// Reads `path` if it exists, then applies environment overrides.
///
/// `REPLICA_*` and `APP__*` variables both work; `APP__*` wins when both are set.
pub fn load_settings_from(path: impl AsRef<Path>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_values(&mut settings, |key| file_cfg.get(key).cloned());
        }
    }

    apply_env(&mut settings, |name| std::env::var(name).ok());
    settings
}

pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    apply_values(settings, |key| {
        let upper = key.to_ascii_uppercase();
        lookup(&format!("APP__{upper}")).or_else(|| lookup(&format!("REPLICA_{upper}")))
    });
}

fn apply_values(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("current_user_id") {
        let v = v.trim();
        if !v.is_empty() {
            settings.current_user_id = Some(UserId::new(v));
        }
    }
    if let Some(v) = lookup("typing_timeout_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.typing_timeout_ms = parsed;
        }
    }
    if let Some(v) = lookup("delivery_flush_interval_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.delivery_flush_interval_ms = parsed;
        }
    }
    if let Some(v) = lookup("log_filter") {
        settings.log_filter = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
