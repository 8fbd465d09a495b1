//! In-memory collaborators for unit tests: a recording device, an app
//! directory and a scripted oracle.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::apps::fuzzy::partial_ratio;
use crate::apps::{AppDirectory, AppInfo};
use crate::device::{Button, DeviceBridge, PackageFilter};
use crate::errors::{DroidClawError, DroidClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, FunctionCall, LlmResponse, ToolCall, ToolDef};

fn unavailable(what: &str) -> DroidClawError {
    DroidClawError::Device(format!("{what} unavailable"))
}

/// Device double that records every mutating command as a short string
/// (`tap 60 40`, `swipe 540 2000 540 400 300`, `text hi`, `press back`, …).
#[derive(Default)]
pub struct FakeDevice {
    hierarchy: Option<String>,
    hierarchy_dumps: Option<usize>,
    dumps_taken: AtomicUsize,
    dump_times: Mutex<Vec<tokio::time::Instant>>,
    window_dump: Option<String>,
    current_package: Option<String>,
    screenshot: Option<Vec<u8>>,
    screen_size: Option<(i32, i32)>,
    third_party: Vec<String>,
    system: Vec<String>,
    labels: HashMap<String, String>,
    label_lookups: Mutex<Vec<String>>,
    failing_input: bool,
    commands: Mutex<Vec<String>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hierarchy(mut self, xml: &str) -> Self {
        self.hierarchy = Some(xml.to_string());
        self
    }

    /// Only the first `n` hierarchy dumps succeed; later ones fail.
    pub fn with_hierarchy_dumps(mut self, n: usize) -> Self {
        self.hierarchy_dumps = Some(n);
        self
    }

    pub fn with_window_dump(mut self, dump: &str) -> Self {
        self.window_dump = Some(dump.to_string());
        self
    }

    pub fn with_current_package(mut self, package: &str) -> Self {
        self.current_package = Some(package.to_string());
        self
    }

    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    pub fn with_screen_size(mut self, width: i32, height: i32) -> Self {
        self.screen_size = Some((width, height));
        self
    }

    pub fn with_packages(mut self, third_party: &[&str], system: &[&str]) -> Self {
        self.third_party = third_party.iter().map(|s| s.to_string()).collect();
        self.system = system.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_labels(mut self, labels: &[(&str, &str)]) -> Self {
        self.labels = labels
            .iter()
            .map(|(package, label)| (package.to_string(), label.to_string()))
            .collect();
        self
    }

    /// Packages whose launcher label was asked for, in order.
    pub fn label_lookups(&self) -> Vec<String> {
        self.label_lookups.lock().unwrap().clone()
    }

    /// Every mutating command fails with a device error (nothing is recorded).
    pub fn with_failing_input(mut self) -> Self {
        self.failing_input = true;
        self
    }

    /// Clock readings taken at every hierarchy dump.
    pub fn dump_times(&self) -> Vec<tokio::time::Instant> {
        self.dump_times.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: String) -> DroidClawResult<()> {
        if self.failing_input {
            return Err(DroidClawError::Device(format!("injected failure: {command}")));
        }
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

#[async_trait]
impl DeviceBridge for FakeDevice {
    async fn dump_hierarchy(&self) -> DroidClawResult<String> {
        self.dump_times.lock().unwrap().push(tokio::time::Instant::now());
        let taken = self.dumps_taken.fetch_add(1, Ordering::SeqCst);
        if self.hierarchy_dumps.is_some_and(|limit| taken >= limit) {
            return Err(unavailable("hierarchy"));
        }
        self.hierarchy.clone().ok_or_else(|| unavailable("hierarchy"))
    }

    async fn window_dump(&self) -> DroidClawResult<String> {
        self.window_dump.clone().ok_or_else(|| unavailable("window dump"))
    }

    async fn current_package(&self) -> DroidClawResult<String> {
        self.current_package.clone().ok_or_else(|| unavailable("current package"))
    }

    async fn tap(&self, x: i32, y: i32) -> DroidClawResult<()> {
        self.record(format!("tap {x} {y}"))
    }

    async fn swipe(&self, from: (i32, i32), to: (i32, i32), duration: Duration) -> DroidClawResult<()> {
        self.record(format!(
            "swipe {} {} {} {} {}",
            from.0,
            from.1,
            to.0,
            to.1,
            duration.as_millis()
        ))
    }

    async fn clear_text(&self) -> DroidClawResult<()> {
        self.record("clear".to_string())
    }

    async fn send_text(&self, text: &str) -> DroidClawResult<()> {
        self.record(format!("text {text}"))
    }

    async fn press(&self, button: Button) -> DroidClawResult<()> {
        self.record(format!("press {}", button.label()))
    }

    async fn launch_app(&self, package: &str) -> DroidClawResult<()> {
        self.record(format!("launch {package}"))
    }

    async fn screen_size(&self) -> DroidClawResult<(i32, i32)> {
        Ok(self.screen_size.unwrap_or((1080, 2400)))
    }

    async fn screenshot(&self) -> DroidClawResult<Vec<u8>> {
        self.screenshot.clone().ok_or_else(|| unavailable("screenshot"))
    }

    async fn list_packages(&self, filter: PackageFilter) -> DroidClawResult<Vec<String>> {
        Ok(match filter {
            PackageFilter::ThirdParty => self.third_party.clone(),
            PackageFilter::System => self.system.clone(),
        })
    }

    async fn app_label(&self, package: &str) -> DroidClawResult<Option<String>> {
        self.label_lookups.lock().unwrap().push(package.to_string());
        Ok(self.labels.get(package).cloned())
    }
}

/// App directory double backed by a fixed list.
pub struct FakeApps {
    apps: Vec<AppInfo>,
    launch_ok: bool,
    launched: Mutex<Vec<String>>,
}

impl FakeApps {
    pub fn new(apps: &[(&str, &str)]) -> Self {
        Self {
            apps: apps
                .iter()
                .map(|(package, name)| AppInfo {
                    package: package.to_string(),
                    common_name: name.to_string(),
                    display_name: None,
                })
                .collect(),
            launch_ok: true,
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failed_launch(mut self) -> Self {
        self.launch_ok = false;
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppDirectory for FakeApps {
    async fn launch(&self, package: &str) -> bool {
        self.launched.lock().unwrap().push(package.to_string());
        self.launch_ok
    }

    async fn fuzzy_search(&self, query: &str, threshold: u8) -> Vec<AppInfo> {
        let query = query.to_lowercase();
        let mut scored: Vec<(u8, &AppInfo)> = self
            .apps
            .iter()
            .map(|app| {
                let score = partial_ratio(&query, &app.common_name.to_lowercase())
                    .max(partial_ratio(&query, &app.package.to_lowercase()));
                (score, app)
            })
            .filter(|(score, _)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, app)| app.clone()).collect()
    }

    async fn summary(&self, max: usize) -> String {
        let mut lines: Vec<String> = self
            .apps
            .iter()
            .take(max)
            .map(|app| format!("- {}: {}", app.best_name(), app.package))
            .collect();
        if self.apps.len() > max {
            lines.push(format!("... and {} more apps", self.apps.len() - max));
        }
        lines.join("\n")
    }
}

/// One canned oracle reply.
#[derive(Clone)]
pub enum Scripted {
    Reply(LlmResponse),
    Fail(String),
}

/// Oracle double that replays a queue of replies; the last one repeats once
/// the queue is exhausted. Every request is recorded.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Scripted>>,
    last: Mutex<Option<Scripted>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn text(content: &str) -> Scripted {
        Scripted::Reply(LlmResponse {
            content: content.to_string(),
            ..LlmResponse::default()
        })
    }

    pub fn tool(name: &str, arguments: &str) -> Scripted {
        Scripted::Reply(LlmResponse {
            tool_calls: vec![ToolCall {
                id: format!("call_{name}"),
                call_type: "function".into(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
            ..LlmResponse::default()
        })
    }

    pub fn fail(message: &str) -> Scripted {
        Scripted::Fail(message.to_string())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        _tools: Vec<ToolDef>,
        _cfg: &CallConfig,
    ) -> DroidClawResult<LlmResponse> {
        self.requests.lock().unwrap().push(messages);

        let next = self.replies.lock().unwrap().pop_front();
        let scripted = match next {
            Some(s) => {
                *self.last.lock().unwrap() = Some(s.clone());
                s
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| ScriptedProvider::text("")),
        };

        match scripted {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Fail(message) => Err(DroidClawError::Oracle(message)),
        }
    }
}

pub fn call_config() -> CallConfig {
    CallConfig {
        model: "test-model".into(),
        stream: false,
        temperature: 0.0,
        max_tokens: 256,
    }
}
