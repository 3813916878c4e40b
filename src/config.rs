//! Process configuration: the app-level config file plus the generic
//! load/save/resolve helpers the rest of the crate builds on.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Generic load for any Serde config type with a `Default` implementation.
/// Falls back to `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                tracing::info!(label, path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                tracing::warn!(label, path = %path.display(), error = %e, "failed to parse config, using defaults");
                T::default()
            }
        },
        Err(_) => {
            tracing::info!(label, path = %path.display(), "no config file, using defaults");
            T::default()
        }
    }
}

/// Generic save for any Serde config type.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T, label: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create config directory: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("failed to serialize config: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("failed to write config file: {}", e))?;
    tracing::info!(label, path = %path.display(), "saved config");
    Ok(())
}

/// Resolve an API key: check the direct `api_key` field first, then fall
/// back to reading the environment variable named in `api_key_env`.
pub fn resolve_api_key(api_key: &Option<String>, api_key_env: &Option<String>) -> Option<String> {
    if let Some(ref key) = api_key {
        if !key.is_empty() {
            return Some(key.clone());
        }
    }
    if let Some(ref env_var) = api_key_env {
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                return Some(key);
            }
        }
    }
    None
}

/// Which transport adapter variant to start. Names match spec §6 exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Aiogram,
    Pyrogram,
    Telethon,
    Telebot,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Aiogram => "aiogram",
            AdapterKind::Pyrogram => "pyrogram",
            AdapterKind::Telethon => "telethon",
            AdapterKind::Telebot => "telebot",
        }
    }

    /// Whether this variant needs `api_id`/`api_hash` in addition to a bot token.
    pub fn requires_user_credentials(&self) -> bool {
        matches!(self, AdapterKind::Pyrogram | AdapterKind::Telethon)
    }
}

fn default_adapter() -> AdapterKind {
    AdapterKind::Aiogram
}

fn default_fallback_lang() -> String {
    "en".to_string()
}

fn default_max_cache_size() -> usize {
    1000
}

fn default_max_file_age_secs() -> u64 {
    3600
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_rate_limit_max_requests() -> u32 {
    10
}

fn default_cache_dir() -> PathBuf {
    dirs_next::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ttskit-rs")
}

/// Top-level application configuration, loaded via [`load_json_config`] and
/// resolved against environment variables via [`resolve_api_key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bot token, or `None` if it must be resolved from `bot_token_env`.
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub bot_token_env: Option<String>,

    #[serde(default = "default_adapter")]
    pub adapter: AdapterKind,

    /// Required only for `pyrogram`/`telethon`.
    #[serde(default)]
    pub api_id: Option<i32>,
    #[serde(default)]
    pub api_hash: Option<String>,

    /// User ids permitted to run admin commands.
    #[serde(default)]
    pub sudo_user_ids: Vec<i64>,

    #[serde(default = "default_fallback_lang")]
    pub fallback_lang: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,
    #[serde(default = "default_max_file_age_secs")]
    pub max_file_age_secs: u64,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Per-language engine priority overrides, merged over the built-in
    /// default policy at startup.
    #[serde(default)]
    pub engine_policies: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub cache_enabled: bool,
    #[serde(default)]
    pub audio_processing: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_token_env: Some("TELOXIDE_TOKEN".to_string()),
            adapter: default_adapter(),
            api_id: None,
            api_hash: None,
            sudo_user_ids: Vec::new(),
            fallback_lang: default_fallback_lang(),
            cache_dir: default_cache_dir(),
            max_cache_size: default_max_cache_size(),
            max_file_age_secs: default_max_file_age_secs(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            engine_policies: HashMap::new(),
            cache_enabled: true,
            audio_processing: true,
        }
    }
}

impl AppConfig {
    pub fn resolved_bot_token(&self) -> Option<String> {
        resolve_api_key(&self.bot_token, &self.bot_token_env)
    }

    pub fn is_sudo(&self, user_id: i64) -> bool {
        self.sudo_user_ids.contains(&user_id)
    }
}
