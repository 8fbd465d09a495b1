//! Console front end: device session setup, one-shot and interactive task
//! runs, human confirmation prompts and progress printing.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::agent_engine::{AgentEngine, AgentEvent, EngineSettings, EventBus, RunReport, RunStatus, ToolContext};
use crate::apps::{AppDirectory, AppLibrary};
use crate::config::AppConfig;
use crate::device::connection::AdbConnection;
use crate::device::DeviceBridge;
use crate::errors::DroidClawResult;
use crate::executor::ExecutorTiming;
use crate::llm::ProviderRegistry;
use crate::perception::screenshot::save_screenshot;

const APP_LIST_LIMIT: usize = 200;
const RESULT_ECHO_LIMIT: usize = 100;

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Empty,
    Quit,
    Apps,
    Screen,
    Screenshot(Option<PathBuf>),
    Task(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let lower = line.to_lowercase();
        match lower.as_str() {
            "" => Self::Empty,
            "quit" | "exit" | "q" => Self::Quit,
            "apps" => Self::Apps,
            "screen" => Self::Screen,
            "screenshot" => Self::Screenshot(None),
            _ if lower.starts_with("screenshot ") => {
                let path = line.get("screenshot ".len()..).unwrap_or_default().trim();
                Self::Screenshot(Some(PathBuf::from(path)))
            }
            _ => Self::Task(line.to_string()),
        }
    }
}

/// Line-oriented prompt over any async reader (stdin in the binary).
pub struct Console<R> {
    lines: Lines<R>,
}

impl Console<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines() }
    }

    /// Prints `text` without a newline and reads one line. `None` on end of input.
    pub async fn prompt(&mut self, text: &str) -> DroidClawResult<Option<String>> {
        print!("{text}");
        std::io::stdout().flush()?;
        Ok(self.lines.next_line().await?)
    }

    pub async fn confirm(&mut self, question: &str) -> DroidClawResult<bool> {
        let answer = self.prompt(&format!("{question} [y/N] ")).await?;
        Ok(matches!(
            answer.as_deref().map(|a| a.trim().to_lowercase()).as_deref(),
            Some("y" | "yes")
        ))
    }
}

/// A connected device plus the engine driving it.
pub struct Session {
    engine: AgentEngine,
    device: Arc<dyn DeviceBridge>,
    apps: Arc<dyn AppDirectory>,
    connection: Option<AdbConnection>,
    printer: Option<JoinHandle<()>>,
}

impl Session {
    /// Connects the device, loads the app library and builds the engine.
    pub async fn connect(cfg: &AppConfig) -> DroidClawResult<Self> {
        let mut connection = AdbConnection::from_config(&cfg.device);
        let device: Arc<dyn DeviceBridge> = Arc::new(connection.connect().await?);

        let (width, height) = device.screen_size().await?;
        println!("Connected. Screen size: {width}x{height}");

        let library = Arc::new(AppLibrary::new(device.clone()).with_label_cache());
        match library.refresh().await {
            Ok(count) => println!("Found {count} apps"),
            Err(e) => tracing::warn!("app library refresh failed: {e}"),
        }

        let registry = ProviderRegistry::from_config(&cfg.llm)?;
        let (provider, call_cfg) = registry.call_config_for_role("tools")?;
        tracing::info!(provider = provider.name(), model = %call_cfg.model, "oracle ready");

        let apps: Arc<dyn AppDirectory> = library;
        let ctx = ToolContext::new(device.clone(), apps.clone(), ExecutorTiming::from(&cfg.agent));
        let engine = AgentEngine::new(ctx, provider, call_cfg, EngineSettings::from_config(cfg))?;

        let mut session = Self::new(engine, device, apps);
        session.connection = Some(connection);
        session.printer = Some(spawn_event_printer(session.engine.events()));
        Ok(session)
    }

    pub fn new(engine: AgentEngine, device: Arc<dyn DeviceBridge>, apps: Arc<dyn AppDirectory>) -> Self {
        Self {
            engine,
            device,
            apps,
            connection: None,
            printer: None,
        }
    }

    /// Runs `goal` to the end, asking for confirmation whenever the engine
    /// pauses. Returns `None` when interrupted with Ctrl-C; actions already
    /// sent to the device stay done.
    pub async fn run_task<R: AsyncBufRead + Unpin>(
        &mut self,
        goal: &str,
        console: &mut Console<R>,
    ) -> DroidClawResult<Option<RunReport>> {
        println!("\n{}\nTASK: {goal}\n{}", "-".repeat(50), "-".repeat(50));

        let mut report = tokio::select! {
            report = self.engine.run(goal) => report,
            _ = tokio::signal::ctrl_c() => return Ok(interrupted()),
        };

        while report.status == RunStatus::NeedsInput {
            println!("\nPending action:");
            println!("{}", report.pending_confirmation.as_deref().unwrap_or("(none)"));
            let approved = console.confirm("Execute?").await?;
            report = tokio::select! {
                report = self.engine.resume(approved) => report?,
                _ = tokio::signal::ctrl_c() => return Ok(interrupted()),
            };
        }

        match report.status {
            RunStatus::Error => println!("\nError: {}", report.message),
            _ => println!("\n{}", report.message),
        }
        Ok(Some(report))
    }

    /// Prompt loop until `quit` or end of input.
    pub async fn interactive<R: AsyncBufRead + Unpin>(&mut self, console: &mut Console<R>) -> DroidClawResult<()> {
        println!("\n{}\nINTERACTIVE MODE\n{}", "=".repeat(50), "=".repeat(50));
        println!("Enter your commands. Type 'quit' to exit.");
        println!("Special: 'apps' (list apps), 'screen' (show UI), 'screenshot <path>'");

        loop {
            let line = tokio::select! {
                line = console.prompt("\nWhat should I do? > ") => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!("\n\nInterrupted. Type 'quit' to exit.");
                    continue;
                }
            };
            let Some(line) = line else { break };

            match ConsoleCommand::parse(&line) {
                ConsoleCommand::Empty => {}
                ConsoleCommand::Quit => {
                    println!("Goodbye!");
                    break;
                }
                ConsoleCommand::Apps => {
                    println!("\nInstalled Apps:");
                    println!("{}", self.apps.summary(APP_LIST_LIMIT).await);
                }
                ConsoleCommand::Screen => match self.engine.context().perception.capture().await {
                    Ok(screen) => println!("\nCurrent Screen:\n{}", screen.summary),
                    Err(e) => println!("\nError: {e}"),
                },
                ConsoleCommand::Screenshot(None) => println!("Usage: screenshot <path>"),
                ConsoleCommand::Screenshot(Some(path)) => {
                    match save_screenshot(self.device.as_ref(), &path).await {
                        Ok(bytes) => println!("Saved {bytes} bytes to {}", path.display()),
                        Err(e) => println!("Error: {e}"),
                    }
                }
                ConsoleCommand::Task(goal) => {
                    if let Err(e) = self.run_task(&goal, console).await {
                        tracing::error!("task failed: {e}");
                        println!("\nError: {e}");
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn disconnect(mut self) {
        if let Some(printer) = self.printer.take() {
            printer.abort();
        }
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
    }
}

fn interrupted() -> Option<RunReport> {
    println!("\nInterrupted. Actions already sent to the device were not undone.");
    None
}

/// Switches a USB-attached device into TCP/IP mode.
pub async fn setup_tcpip(cfg: &AppConfig) -> DroidClawResult<()> {
    let connection = AdbConnection::from_config(&cfg.device);
    connection.setup_tcpip(cfg.device.port).await?;
    let ip = cfg.device.ip.as_deref().unwrap_or("<device-ip>");
    println!("TCP/IP mode enabled. Disconnect USB, then run: droidclaw {ip} --port {}", cfg.device.port);
    Ok(())
}

/// Prints progress events to stdout until the bus closes.
pub fn spawn_event_printer(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(text) = render_event(&event) {
                        println!("{text}");
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Console rendering of a progress event. Confirmation and completion are
/// printed by the task runner itself.
pub fn render_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::StepStarted { step, package, .. } => Some(match package {
            Some(pkg) => format!("\n--- Step {step} ---\nCurrent app: {pkg}"),
            None => format!("\n--- Step {step} ---"),
        }),
        AgentEvent::ToolPlanned { tool, arguments } => Some(format!("Planning: {tool}({arguments})")),
        AgentEvent::ToolExecuted { tool, ok, result } => {
            let head = if *ok {
                format!("Executed: {tool}")
            } else {
                format!("Failed: {tool}")
            };
            if result.chars().count() < RESULT_ECHO_LIMIT {
                Some(format!("{head}\n   Result: {result}"))
            } else {
                Some(head)
            }
        }
        AgentEvent::Thinking { .. } | AgentEvent::ConfirmationRequired { .. } | AgentEvent::Finished { .. } => None,
    }
}
