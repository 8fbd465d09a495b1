use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DroidClawError, DroidClawResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderEntry {
                display_name: "OpenAI".into(),
                api_base: "https://api.openai.com/v1/chat/completions".into(),
                model: "gpt-4o-mini".into(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
                api_key: None,
            },
        );
        Self {
            active_provider: "openai".into(),
            providers,
            roles: RolesConfig::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    /// Full chat-completions endpoint.
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional API key stored in config.toml (falls back to env var DROIDCLAW_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps agent roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Tool-calling model that drives the Reason node.
    pub tools: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Use SSE streaming.
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_request_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    /// Explicit adb serial; wins over `ip`/`use_usb` discovery.
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub use_usb: bool,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Host `aapt` used for launcher labels; searched for when unset.
    #[serde(default)]
    pub aapt_path: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            serial: None,
            ip: None,
            port: default_port(),
            use_usb: false,
            command_timeout_secs: default_command_timeout(),
            aapt_path: None,
        }
    }
}

fn default_adb_path() -> String {
    "adb".into()
}

fn default_port() -> u16 {
    5555
}

fn default_command_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Pause before re-capturing the screen after an action.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Pause after a successful app launch.
    #[serde(default = "default_app_launch_settle")]
    pub app_launch_settle_ms: u64,
    /// How much of the screen summary is repeated in the per-step context block.
    #[serde(default = "default_summary_chars")]
    pub screen_summary_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            settle_delay_ms: default_settle_delay(),
            app_launch_settle_ms: default_app_launch_settle(),
            screen_summary_chars: default_summary_chars(),
        }
    }
}

fn default_max_steps() -> u32 {
    20
}

fn default_settle_delay() -> u64 {
    1000
}

fn default_app_launch_settle() -> u64 {
    2000
}

fn default_summary_chars() -> usize {
    1500
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafetyConfig {
    /// Pause for human confirmation before executing device actions.
    #[serde(default)]
    pub confirm_actions: bool,
    /// Tool names that need confirmation. Empty means every device-mutating tool.
    #[serde(default)]
    pub require_approval_for: Vec<String>,
}

/// Turns an OpenAI-style base URL (`http://host/v1`) into the chat-completions endpoint.
pub fn chat_endpoint(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

fn resolve_config_path() -> DroidClawResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("droidclaw").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(candidate);
        }
    }

    Err(DroidClawError::Config(
        "config.toml not found next to executable, in working directory or user config dir".into(),
    ))
}

pub fn load_config() -> DroidClawResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> DroidClawResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}
