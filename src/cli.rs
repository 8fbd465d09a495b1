use std::path::PathBuf;

use clap::Parser;

use crate::config::{chat_endpoint, AppConfig, ProviderEntry};
use crate::errors::{DroidClawError, DroidClawResult};

/// Provider id registered by `--local-llm`.
pub const LOCAL_PROVIDER: &str = "local";

const LOCAL_DEFAULT_MODEL: &str = "gpt-oss:20b";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "droidclaw",
    version,
    about = "Control an Android device with natural language"
)]
pub struct Cli {
    /// IP address of the device (not needed with --usb)
    pub device_ip: Option<String>,

    /// Connect over USB instead of TCP/IP
    #[arg(long)]
    pub usb: bool,

    /// ADB TCP/IP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Explicit adb serial
    #[arg(long)]
    pub serial: Option<String>,

    /// Model name sent to the oracle
    #[arg(short, long)]
    pub model: Option<String>,

    /// OpenAI-compatible base URL of a local server (e.g. http://localhost:11434/v1)
    #[arg(long, value_name = "URL")]
    pub local_llm: Option<String>,

    /// Run a single task and exit
    #[arg(short, long)]
    pub task: Option<String>,

    /// Switch a USB-attached device into TCP/IP mode and exit
    #[arg(long)]
    pub setup_tcpip: bool,

    /// Ask before executing device actions
    #[arg(long)]
    pub confirm: bool,

    /// Path to config.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Layers the command-line flags over `cfg`.
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(ip) = &self.device_ip {
            cfg.device.ip = Some(ip.clone());
            cfg.device.use_usb = false;
        }
        if self.usb {
            cfg.device.use_usb = true;
        }
        if let Some(port) = self.port {
            cfg.device.port = port;
        }
        if let Some(serial) = &self.serial {
            cfg.device.serial = Some(serial.clone());
        }
        if self.confirm {
            cfg.safety.confirm_actions = true;
        }

        if let Some(url) = &self.local_llm {
            let model = self
                .model
                .clone()
                .unwrap_or_else(|| LOCAL_DEFAULT_MODEL.to_string());
            cfg.llm.providers.insert(
                LOCAL_PROVIDER.to_string(),
                ProviderEntry {
                    display_name: "Local LLM".into(),
                    api_base: chat_endpoint(url),
                    model,
                    temperature: 0.1,
                    max_tokens: 2000,
                    api_key: None,
                },
            );
            cfg.llm.active_provider = LOCAL_PROVIDER.to_string();
            // A configured role may point at a remote provider.
            cfg.llm.roles.tools = None;
        } else if let Some(model) = &self.model {
            if let Some(entry) = cfg.llm.providers.get_mut(&cfg.llm.active_provider) {
                entry.model = model.clone();
            }
            if let Some(role) = cfg.llm.roles.tools.as_mut() {
                role.model = model.clone();
            }
        }
    }

    /// Checks that a device target is known, unless only TCP/IP setup was requested.
    pub fn validate(&self, cfg: &AppConfig) -> DroidClawResult<()> {
        if self.setup_tcpip {
            return Ok(());
        }
        let dev = &cfg.device;
        if dev.serial.is_none() && dev.ip.is_none() && !dev.use_usb {
            return Err(DroidClawError::Config(
                "Either a device IP or --usb is required".into(),
            ));
        }
        Ok(())
    }
}
