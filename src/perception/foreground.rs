use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::device::DeviceBridge;
use crate::perception::traits::ForegroundProbe;

pub const UNKNOWN_PACKAGE: &str = "unknown";

static CURRENT_FOCUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mCurrentFocus.*?([a-zA-Z][a-zA-Z0-9_]*(?:\.[a-zA-Z][a-zA-Z0-9_]*)+)/")
        .expect("mCurrentFocus regex")
});

static FOCUSED_APP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mFocusedApp.*?([a-zA-Z][a-zA-Z0-9_]*(?:\.[a-zA-Z][a-zA-Z0-9_]*)+)/")
        .expect("mFocusedApp regex")
});

/// Reads the focus owner out of the window manager dump.
pub struct WindowDumpProbe;

#[async_trait]
impl ForegroundProbe for WindowDumpProbe {
    fn name(&self) -> &'static str {
        "window_dump"
    }

    async fn probe(&self, device: &dyn DeviceBridge) -> Option<String> {
        match device.window_dump().await {
            Ok(dump) => parse_focused_package(&dump),
            Err(e) => {
                tracing::debug!(error = %e, "window dump unavailable");
                None
            }
        }
    }
}

/// Asks the device layer directly.
pub struct DirectQueryProbe;

#[async_trait]
impl ForegroundProbe for DirectQueryProbe {
    fn name(&self) -> &'static str {
        "direct_query"
    }

    async fn probe(&self, device: &dyn DeviceBridge) -> Option<String> {
        match device.current_package().await {
            Ok(pkg) if !pkg.is_empty() => Some(pkg),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "direct foreground query failed");
                None
            }
        }
    }
}

/// Window dump first, then the direct query.
pub fn default_probes() -> Vec<Box<dyn ForegroundProbe>> {
    vec![Box::new(WindowDumpProbe), Box::new(DirectQueryProbe)]
}

/// `package/activity` from the focus-owner line, falling back to the focused-app line.
pub fn parse_focused_package(dump: &str) -> Option<String> {
    CURRENT_FOCUS
        .captures(dump)
        .or_else(|| FOCUSED_APP.captures(dump))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Runs the probes in order; first hit wins, otherwise [`UNKNOWN_PACKAGE`].
pub async fn detect_foreground(probes: &[Box<dyn ForegroundProbe>], device: &dyn DeviceBridge) -> String {
    for probe in probes {
        if let Some(pkg) = probe.probe(device).await {
            tracing::debug!(probe = probe.name(), package = %pkg, "foreground app resolved");
            return pkg;
        }
    }
    tracing::debug!("foreground app unknown");
    UNKNOWN_PACKAGE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    const WINDOWS: &str = "\
  mCurrentFocus=Window{3c1 u0 com.spotify.music/com.spotify.music.MainActivity}
  mFocusedApp=ActivityRecord{9f2 u0 com.spotify.music/.MainActivity t51}";

    #[test]
    fn focus_owner_wins() {
        assert_eq!(parse_focused_package(WINDOWS).as_deref(), Some("com.spotify.music"));
    }

    #[test]
    fn focused_app_is_second_choice() {
        let dump = "  mCurrentFocus=null\n  mFocusedApp=ActivityRecord{1 u0 org.telegram.messenger/.Launch t3}";
        assert_eq!(parse_focused_package(dump).as_deref(), Some("org.telegram.messenger"));
        assert_eq!(parse_focused_package("mCurrentFocus=null"), None);
    }

    #[tokio::test]
    async fn falls_back_to_direct_query() {
        let device = FakeDevice::new().with_window_dump("mCurrentFocus=null").with_current_package("com.whatsapp");
        assert_eq!(detect_foreground(&default_probes(), &device).await, "com.whatsapp");
    }

    #[tokio::test]
    async fn first_success_wins_even_if_strategies_disagree() {
        let device = FakeDevice::new().with_window_dump(WINDOWS).with_current_package("com.whatsapp");
        assert_eq!(detect_foreground(&default_probes(), &device).await, "com.spotify.music");
    }

    #[tokio::test]
    async fn unknown_when_everything_fails() {
        let device = FakeDevice::new();
        assert_eq!(detect_foreground(&default_probes(), &device).await, UNKNOWN_PACKAGE);
    }
}
