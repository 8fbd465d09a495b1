//! Perception pipeline: device tree dump → element list → registry + summary.
use std::sync::Arc;

use crate::device::DeviceBridge;
use crate::errors::{DroidClawError, DroidClawResult};
use crate::perception::foreground::{default_probes, detect_foreground};
use crate::perception::registry::ElementRegistry;
use crate::perception::traits::ForegroundProbe;
use crate::perception::types::Element;
use crate::perception::ui_tree;

/// Result of one perception cycle.
#[derive(Debug, Clone)]
pub struct ScreenPerception {
    pub package: String,
    pub summary: String,
    pub registry: ElementRegistry,
}

pub struct PerceptionEngine {
    device: Arc<dyn DeviceBridge>,
    probes: Vec<Box<dyn ForegroundProbe>>,
}

impl PerceptionEngine {
    pub fn new(device: Arc<dyn DeviceBridge>) -> Self {
        Self::with_probes(device, default_probes())
    }

    pub fn with_probes(device: Arc<dyn DeviceBridge>, probes: Vec<Box<dyn ForegroundProbe>>) -> Self {
        Self { device, probes }
    }

    /// Captures the current screen.
    ///
    /// 1. Dump the accessibility tree (failure → `Capture`).
    /// 2. Walk it into elements with ids `1..=N`.
    /// 3. Resolve the foreground package (never fails; `unknown` at worst).
    /// 4. Render the summary text.
    pub async fn capture(&self) -> DroidClawResult<ScreenPerception> {
        let xml = self
            .device
            .dump_hierarchy()
            .await
            .map_err(|e| DroidClawError::Capture(format!("UI tree unavailable: {e}")))?;

        let elements = ui_tree::collect_elements(&xml)?;
        let package = detect_foreground(&self.probes, self.device.as_ref()).await;
        let summary = render_summary(&package, &elements);

        tracing::info!(package = %package, elements = elements.len(), "screen captured");

        Ok(ScreenPerception {
            package,
            summary,
            registry: ElementRegistry::new(elements),
        })
    }
}

/// Text shown to the oracle: header with the foreground package, then one line
/// per listed element.
pub fn render_summary(package: &str, elements: &[Element]) -> String {
    let mut lines = vec![
        format!("Current App: {package}"),
        String::new(),
        "Interactive Elements:".to_string(),
    ];
    lines.extend(
        elements
            .iter()
            .filter(|e| e.is_listed())
            .map(|e| format!("  {}", e.summary_line())),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    const LOGIN: &str = r#"<hierarchy rotation="0"><node class="android.widget.Button" text="Login" clickable="true" enabled="true" bounds="[10,20][110,60]"/></hierarchy>"#;

    #[tokio::test]
    async fn capture_login_screen() {
        let device = Arc::new(
            FakeDevice::new()
                .with_hierarchy(LOGIN)
                .with_window_dump("mCurrentFocus=Window{1 u0 com.example.bank/.Login}"),
        );
        let engine = PerceptionEngine::new(device);
        let p = engine.capture().await.unwrap();

        assert_eq!(p.package, "com.example.bank");
        assert_eq!(p.registry.len(), 1);
        let el = p.registry.get(1).unwrap();
        assert_eq!(el.center(), (60, 40));
        assert!(p.summary.starts_with("Current App: com.example.bank"));
        assert!(p.summary.contains("[1] \"Login\" • clickable"));
    }

    #[tokio::test]
    async fn ids_restart_every_capture() {
        let device = Arc::new(FakeDevice::new().with_hierarchy(LOGIN));
        let engine = PerceptionEngine::new(device);
        let first = engine.capture().await.unwrap();
        let second = engine.capture().await.unwrap();
        assert_eq!(first.registry.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(second.registry.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(second.package, "unknown");
    }

    #[tokio::test]
    async fn missing_tree_is_capture_error() {
        let device = Arc::new(FakeDevice::new());
        let err = PerceptionEngine::new(device).capture().await.unwrap_err();
        assert!(matches!(err, DroidClawError::Capture(_)));
    }

    #[test]
    fn summary_lists_only_labelled_or_interactive() {
        let xml = r#"<hierarchy>
            <node class="android.widget.FrameLayout" resource-id="com.app:id/content" bounds="[0,0][100,100]">
                <node class="androidx.recyclerview.widget.RecyclerView" scrollable="true" bounds="[0,0][100,90]"/>
                <node class="android.widget.ImageView" content-desc="Profile" bounds="[0,90][10,100]"/>
            </node>
        </hierarchy>"#;
        let elements = ui_tree::collect_elements(xml).unwrap();
        assert_eq!(elements.len(), 3);

        let summary = render_summary("com.app", &elements);
        let lines: Vec<&str> = summary.lines().skip(3).collect();
        assert_eq!(lines, vec!["  [2] RecyclerView • scrollable", "  [3] [Profile]"]);
    }
}
