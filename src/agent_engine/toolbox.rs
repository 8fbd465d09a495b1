use std::sync::Arc;

use serde_json::{Map, Value};

use crate::agent_engine::state::Action;
use crate::apps::AppDirectory;
use crate::device::DeviceBridge;
use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::{ActionExecutor, ActionOutcome, ExecutorTiming};
use crate::perception::{ElementRegistry, PerceptionEngine};

const SEARCH_THRESHOLD: u8 = 60;
const SEARCH_LIMIT: usize = 10;
const LIST_LIMIT: usize = 200;

/// Everything a tool invocation may touch, handed to the engine explicitly.
pub struct ToolContext {
    pub perception: PerceptionEngine,
    pub executor: ActionExecutor,
    pub apps: Arc<dyn AppDirectory>,
}

impl ToolContext {
    pub fn new(device: Arc<dyn DeviceBridge>, apps: Arc<dyn AppDirectory>, timing: ExecutorTiming) -> Self {
        Self {
            perception: PerceptionEngine::new(device.clone()),
            executor: ActionExecutor::new(device, apps.clone(), timing),
            apps,
        }
    }
}

/// A resolved tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOp {
    Device(Action),
    ScreenState,
    SearchApps { query: String },
    ListApps,
}

/// Resolves a tool name plus its JSON argument object into a [`ToolOp`].
///
/// Accepts the declared parameter names and the older aliases
/// (`uid`/`target_uid`, `package_name`/`app_package`, `click_element`, …).
pub fn parse_tool_call(name: &str, arguments: &str) -> DroidClawResult<ToolOp> {
    let args = parse_arguments(name, arguments)?;

    let op = match name {
        "click" | "click_element" => ToolOp::Device(Action::Click {
            target: arg_u32(&args, &["id", "uid", "target_uid", "element_id"]),
        }),
        "type" | "type_text" => ToolOp::Device(Action::Type {
            text: arg_str(&args, &["text"]),
        }),
        "scroll" | "scroll_screen" => ToolOp::Device(Action::Scroll {
            direction: arg_str(&args, &["direction"]),
        }),
        "open_app" => ToolOp::Device(Action::OpenApp {
            package: arg_str(&args, &["package", "package_name", "app_package"]),
        }),
        "back" | "press_back" => ToolOp::Device(Action::Back),
        "home" | "press_home" => ToolOp::Device(Action::Home),
        "wait" | "wait_for_screen" => ToolOp::Device(Action::Wait {
            seconds: arg_u32(&args, &["seconds"]).map(u64::from),
        }),
        "done" => ToolOp::Device(Action::Done {
            message: arg_str(&args, &["message"]),
        }),
        "respond" => ToolOp::Device(Action::Respond {
            message: arg_str(&args, &["message"]),
        }),
        "ask" => ToolOp::Device(Action::Ask {
            message: arg_str(&args, &["message"]),
        }),
        "get_screen_state" => ToolOp::ScreenState,
        "search_installed_apps" => ToolOp::SearchApps {
            query: arg_str(&args, &["query"]).unwrap_or_default(),
        },
        "list_all_apps" => ToolOp::ListApps,
        other => return Err(DroidClawError::UnknownAction(other.to_string())),
    };
    Ok(op)
}

/// Runs one tool. Never fails: every problem comes back as a failed outcome.
/// `get_screen_state` replaces `registry` with the fresh capture, or empties
/// it when the capture fails.
pub async fn invoke(ctx: &ToolContext, op: &ToolOp, registry: &mut ElementRegistry) -> ActionOutcome {
    match op {
        ToolOp::Device(action) => ctx.executor.execute(action, registry).await,
        ToolOp::ScreenState => match ctx.perception.capture().await {
            Ok(screen) => {
                *registry = screen.registry;
                outcome(true, screen.summary)
            }
            Err(e) => {
                *registry = ElementRegistry::default();
                outcome(false, format!("Error getting screen state: {e}"))
            }
        },
        ToolOp::SearchApps { query } => {
            let query = query.trim();
            if query.is_empty() {
                return outcome(false, "No query provided for search_installed_apps".into());
            }
            let matches = ctx.apps.fuzzy_search(query, SEARCH_THRESHOLD).await;
            if matches.is_empty() {
                return outcome(true, format!("No apps found matching '{query}'"));
            }
            let mut lines = vec![format!("Apps matching '{query}':")];
            lines.extend(
                matches
                    .iter()
                    .take(SEARCH_LIMIT)
                    .map(|app| format!("  - {}: {}", app.best_name(), app.package)),
            );
            outcome(true, lines.join("\n"))
        }
        ToolOp::ListApps => outcome(true, ctx.apps.summary(LIST_LIMIT).await),
    }
}

fn outcome(ok: bool, message: String) -> ActionOutcome {
    ActionOutcome { ok, message }
}

fn parse_arguments(name: &str, arguments: &str) -> DroidClawResult<Map<String, Value>> {
    if arguments.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(DroidClawError::Executor(format!(
            "Invalid arguments for {name}: expected an object, got {other}"
        ))),
        Err(e) => Err(DroidClawError::Executor(format!("Invalid arguments for {name}: {e}"))),
    }
}

fn arg_str(args: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match args.get(*k)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Integer argument; numeric strings (`"12"`) are accepted too.
fn arg_u32(args: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| match args.get(*k)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
