use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::Action;
use crate::apps::AppDirectory;
use crate::config::AgentConfig;
use crate::device::{Button, DeviceBridge};
use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::coordinator::{scroll_swipe, ScrollDirection};
use crate::perception::ElementRegistry;

const DEFAULT_WAIT_SECS: u64 = 2;
const MAX_WAIT_SECS: u64 = 30;

/// Result of one executed action. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub ok: bool,
    pub message: String,
}

impl ActionOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl From<DroidClawResult<String>> for ActionOutcome {
    fn from(result: DroidClawResult<String>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutorTiming {
    /// Pause after a successful app launch before reporting back.
    pub launch_settle: Duration,
    pub swipe_duration: Duration,
}

impl Default for ExecutorTiming {
    fn default() -> Self {
        Self {
            launch_settle: Duration::from_millis(2000),
            swipe_duration: Duration::from_millis(300),
        }
    }
}

impl From<&AgentConfig> for ExecutorTiming {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            launch_settle: Duration::from_millis(cfg.app_launch_settle_ms),
            ..Self::default()
        }
    }
}

/// Turns an [`Action`] into device commands against the current registry.
pub struct ActionExecutor {
    device: Arc<dyn DeviceBridge>,
    apps: Arc<dyn AppDirectory>,
    timing: ExecutorTiming,
}

impl ActionExecutor {
    pub fn new(device: Arc<dyn DeviceBridge>, apps: Arc<dyn AppDirectory>, timing: ExecutorTiming) -> Self {
        Self { device, apps, timing }
    }

    pub async fn execute(&self, action: &Action, registry: &ElementRegistry) -> ActionOutcome {
        let outcome: ActionOutcome = match action {
            Action::Click { target } => self.click(*target, registry).await.into(),
            Action::Type { text } => self.type_text(text.as_deref()).await.into(),
            Action::Scroll { direction } => self.scroll(direction.as_deref()).await.into(),
            Action::OpenApp { package } => self.open_app(package.as_deref()).await,
            Action::Back => self
                .device
                .press(Button::Back)
                .await
                .map(|()| "Pressed back".to_string())
                .map_err(|e| DroidClawError::Executor(format!("Back failed: {e}")))
                .into(),
            Action::Home => self
                .device
                .press(Button::Home)
                .await
                .map(|()| "Pressed home".to_string())
                .map_err(|e| DroidClawError::Executor(format!("Home failed: {e}")))
                .into(),
            Action::Wait { seconds } => {
                let secs = seconds.unwrap_or(DEFAULT_WAIT_SECS).min(MAX_WAIT_SECS);
                tokio::time::sleep(Duration::from_secs(secs)).await;
                ActionOutcome::ok(format!("Waited {secs} seconds"))
            }
            Action::Done { message } => {
                ActionOutcome::ok(message.clone().unwrap_or_else(|| "Task completed".into()))
            }
            Action::Respond { message } => {
                ActionOutcome::ok(message.clone().unwrap_or_else(|| "No message".into()))
            }
            Action::Ask { message } => {
                ActionOutcome::ok(message.clone().unwrap_or_else(|| "No question".into()))
            }
        };

        if outcome.ok {
            tracing::info!(action = action.name(), "{}", outcome.message);
        } else {
            tracing::warn!(action = action.name(), "{}", outcome.message);
        }
        outcome
    }

    async fn click(&self, target: Option<u32>, registry: &ElementRegistry) -> DroidClawResult<String> {
        let id = target.ok_or_else(|| DroidClawError::Executor("No target id provided for click action".into()))?;
        let element = registry.get(id).ok_or(DroidClawError::ElementNotFound(id))?;
        let (x, y) = element.center();
        self.device
            .tap(x, y)
            .await
            .map_err(|e| DroidClawError::Executor(format!("Click failed: {e}")))?;
        Ok(format!("Clicked on {} at ({x}, {y})", element.describe()))
    }

    async fn type_text(&self, text: Option<&str>) -> DroidClawResult<String> {
        let text = text
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DroidClawError::Executor("No text provided for type action".into()))?;
        let typed = async {
            self.device.clear_text().await?;
            self.device.send_text(text).await
        };
        typed
            .await
            .map_err(|e| DroidClawError::Executor(format!("Type failed: {e}")))?;
        Ok(format!("Typed: {text}"))
    }

    async fn scroll(&self, direction: Option<&str>) -> DroidClawResult<String> {
        let direction = ScrollDirection::parse(direction)?;
        let swiped = async {
            let size = self.device.screen_size().await?;
            let swipe = scroll_swipe(direction, size);
            self.device.swipe(swipe.from, swipe.to, self.timing.swipe_duration).await
        };
        swiped
            .await
            .map_err(|e| DroidClawError::Executor(format!("Scroll failed: {e}")))?;
        Ok(format!("Scrolled {}", direction.as_str()))
    }

    async fn open_app(&self, package: Option<&str>) -> ActionOutcome {
        let Some(package) = package.map(str::trim).filter(|p| !p.is_empty()) else {
            return ActionOutcome::failed("No package provided for open_app action");
        };
        if !self.apps.launch(package).await {
            return ActionOutcome::failed(format!("Failed to open {package}"));
        }
        tokio::time::sleep(self.timing.launch_settle).await;
        ActionOutcome::ok(format!("Opened {package}"))
    }
}
