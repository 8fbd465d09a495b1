use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One launchable app on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub package: String,
    /// Derived from the package name.
    pub common_name: String,
    /// Real launcher label, when one is known.
    pub display_name: Option<String>,
}

impl AppInfo {
    pub fn best_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.common_name)
    }
}

/// Installed-application directory the agent consults and launches through.
#[async_trait]
pub trait AppDirectory: Send + Sync {
    /// Starts `package`; `false` on any failure.
    async fn launch(&self, package: &str) -> bool;

    /// Apps scoring at least `threshold` (0-100), best match first.
    async fn fuzzy_search(&self, query: &str, threshold: u8) -> Vec<AppInfo>;

    /// `- Name: package` lines for at most `max` apps.
    async fn summary(&self, max: usize) -> String;
}
