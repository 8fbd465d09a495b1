use std::time::Duration;

use async_trait::async_trait;

use crate::errors::DroidClawResult;

/// Hardware/system buttons the agent may press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Back,
    Home,
}

impl Button {
    pub fn keycode(self) -> &'static str {
        match self {
            Button::Back => "KEYCODE_BACK",
            Button::Home => "KEYCODE_HOME",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Button::Back => "back",
            Button::Home => "home",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFilter {
    ThirdParty,
    System,
}

/// Command surface of one connected device.
///
/// Every call is bounded by the bridge's own timeout; a timeout surfaces as an
/// ordinary `Device` error.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Raw accessibility tree dump (uiautomator XML).
    async fn dump_hierarchy(&self) -> DroidClawResult<String>;

    /// Window manager status dump, used for foreground-app detection.
    async fn window_dump(&self) -> DroidClawResult<String>;

    /// Package name of the app currently in the foreground.
    async fn current_package(&self) -> DroidClawResult<String>;

    async fn tap(&self, x: i32, y: i32) -> DroidClawResult<()>;

    async fn swipe(&self, from: (i32, i32), to: (i32, i32), duration: Duration) -> DroidClawResult<()>;

    /// Clears the currently focused input field.
    async fn clear_text(&self) -> DroidClawResult<()>;

    /// Types `text` verbatim into the focused input field.
    async fn send_text(&self, text: &str) -> DroidClawResult<()>;

    async fn press(&self, button: Button) -> DroidClawResult<()>;

    async fn launch_app(&self, package: &str) -> DroidClawResult<()>;

    /// Screen size in pixels as `(width, height)`.
    async fn screen_size(&self) -> DroidClawResult<(i32, i32)>;

    /// PNG-encoded screenshot.
    async fn screenshot(&self) -> DroidClawResult<Vec<u8>>;

    async fn list_packages(&self, filter: PackageFilter) -> DroidClawResult<Vec<String>>;

    /// Launcher label of an installed package. `None` when the bridge has no
    /// way to read it.
    async fn app_label(&self, package: &str) -> DroidClawResult<Option<String>>;
}
