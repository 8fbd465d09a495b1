use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::agent_engine::event_bus::{AgentEvent, EventBus};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::reply::{interpret_reply, Reply, CORRECTIVE_PROMPT};
use crate::agent_engine::state::{AgentState, EndReason, Node, RunReport, RunStatus};
use crate::agent_engine::toolbox::{invoke, parse_tool_call, ToolContext, ToolOp};
use crate::apps::context::{app_context_for_goal, initial_message};
use crate::config::AppConfig;
use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::safety::requires_approval;
use crate::executor::ActionOutcome;
use crate::llm::provider::LlmProvider;
use crate::llm::tools::load_builtin_tools;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse, ToolDef};
use crate::perception::ElementRegistry;

const SYSTEM_PROMPT: &str = "\
You are DroidClaw, an Android automation agent. You control a phone and help users accomplish tasks.

How you work:
- You run in a loop: reason about the situation, act with one tool, then observe the result.
- Screen elements are listed as `[id] label`. Use that id with `click`.
- To open an app use `open_app` with its package name; never hunt for icons. \
Use `search_installed_apps` when you do not know the package.
- To type, click the input field first, then use `type`.
- Use `get_screen_state` whenever you are unsure what is on screen.

When to stop:
- After the requested action succeeded, reply with a short confirmation and no tool call.
- If the user asked a question (how many, what, which, list), gather the facts, then answer in plain text.
- If the task cannot be done, explain why. If you need more details, ask.
- Do not keep trying once you have already succeeded.";

const REJECTED: &str = "Action rejected by user";
const FALLBACK_MESSAGE: &str = "Task completed";

/// Knobs of one engine, resolved from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_steps: u32,
    /// Pause before every perception after the first.
    pub settle_delay: Duration,
    pub screen_summary_chars: usize,
    pub confirm_actions: bool,
    pub require_approval_for: Vec<String>,
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_steps: cfg.agent.max_steps,
            settle_delay: Duration::from_millis(cfg.agent.settle_delay_ms),
            screen_summary_chars: cfg.agent.screen_summary_chars,
            confirm_actions: cfg.safety.confirm_actions,
            require_approval_for: cfg.safety.require_approval_for.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The perceive → reason → act state machine. One run at a time; a run paused
/// for confirmation is kept until [`AgentEngine::resume`].
pub struct AgentEngine {
    ctx: ToolContext,
    provider: Arc<dyn LlmProvider>,
    call_cfg: CallConfig,
    tools: Vec<ToolDef>,
    settings: EngineSettings,
    loop_ctrl: LoopController,
    events: EventBus,
    registry: ElementRegistry,
    paused: Option<AgentState>,
}

impl AgentEngine {
    pub fn new(
        ctx: ToolContext,
        provider: Arc<dyn LlmProvider>,
        call_cfg: CallConfig,
        settings: EngineSettings,
    ) -> DroidClawResult<Self> {
        Ok(Self {
            ctx,
            provider,
            call_cfg,
            tools: load_builtin_tools()?,
            loop_ctrl: LoopController::new(settings.max_steps),
            settings,
            events: EventBus::new(),
            registry: ElementRegistry::default(),
            paused: None,
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.paused.is_some()
    }

    /// Runs `goal` until it completes, fails, hits the step ceiling or needs confirmation.
    pub async fn run(&mut self, goal: &str) -> RunReport {
        if self.paused.take().is_some() {
            tracing::warn!("discarding run that was awaiting confirmation");
        }
        self.registry = ElementRegistry::default();

        let mut state = AgentState::new(goal);
        let app_context = app_context_for_goal(self.ctx.apps.as_ref(), goal).await;
        if !app_context.is_empty() {
            tracing::debug!("attached installed-app context to goal");
        }
        state.log.push(ChatMessage::user(initial_message(goal, &app_context)));

        let span = tracing::info_span!("run", run_id = %state.run_id);
        async {
            tracing::info!(goal = %goal, "run started");
            self.drive(state, Node::Perceive).await
        }
        .instrument(span)
        .await
    }

    /// Continues a run paused in HumanReview. Approval executes the pending
    /// invocations; rejection records them as rejected and perceives again.
    pub async fn resume(&mut self, approved: bool) -> DroidClawResult<RunReport> {
        let mut state = self
            .paused
            .take()
            .ok_or_else(|| DroidClawError::Executor("No run is awaiting confirmation".into()))?;

        state.pending_confirmation = None;
        state.end_reason = None;
        state.status = RunStatus::Running;

        let span = tracing::info_span!("run", run_id = %state.run_id);
        let report = async {
            if approved {
                tracing::info!("invocation approved → Act");
                self.drive(state, Node::Act).await
            } else {
                tracing::info!("invocation rejected → Perceive");
                let calls = state.log.pending_tool_calls().map(<[_]>::to_vec).unwrap_or_default();
                for call in &calls {
                    state.log.push(ChatMessage::tool(&call.id, REJECTED));
                }
                if let Some(first) = calls.first() {
                    state.last_action = Some(first.function.name.clone());
                    state.last_result = Some(REJECTED.to_string());
                }
                let next = if self.loop_ctrl.reached(state.step) {
                    Node::End
                } else {
                    Node::Perceive
                };
                self.drive(state, next).await
            }
        }
        .instrument(span)
        .await;
        Ok(report)
    }

    async fn drive(&mut self, mut state: AgentState, start: Node) -> RunReport {
        let mut node = start;
        loop {
            tracing::debug!(?node, step = state.step, "node");
            node = match node {
                // ── Perceive: refresh the screen ──────────────────────────
                Node::Perceive => {
                    self.perceive(&mut state).await;
                    Node::Reason
                }

                // ── Reason: ask the oracle ────────────────────────────────
                Node::Reason => {
                    self.reason(&mut state).await;
                    self.route_after_reason(&state)
                }

                // ── HumanReview: park the run until resume() ──────────────
                Node::HumanReview => {
                    self.human_review(&mut state);
                    let report = self.report(&state);
                    self.paused = Some(state);
                    return report;
                }

                // ── Act: execute every pending invocation ─────────────────
                Node::Act => {
                    self.act(&mut state).await;
                    self.route_after_act(&state)
                }

                Node::End => break,
            };
        }
        self.finish(state)
    }

    async fn perceive(&mut self, state: &mut AgentState) {
        state.step += 1;
        if state.step > 1 && !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        match self.ctx.perception.capture().await {
            Ok(screen) => {
                state.current_screen = screen.summary;
                state.current_app = screen.package;
                self.registry = screen.registry;
            }
            Err(e) => {
                tracing::warn!(step = state.step, "perception failed: {e}");
                state.current_screen = format!("Error getting screen state: {e}");
                // Ids from the previous cycle must not resolve against an unknown screen.
                self.registry = ElementRegistry::default();
            }
        }

        tracing::info!(step = state.step, package = %state.current_app, "perceived");
        self.events.emit(AgentEvent::StepStarted {
            run_id: state.run_id.clone(),
            step: state.step,
            package: (!state.current_app.is_empty()).then(|| state.current_app.clone()),
        });
    }

    async fn reason(&mut self, state: &mut AgentState) {
        self.events.emit(AgentEvent::Thinking { step: state.step });

        match self.ask_oracle(state).await {
            Ok(Reply::Invocations { content, calls }) => {
                for call in &calls {
                    tracing::info!(tool = %call.function.name, args = %call.function.arguments, "tool planned");
                    self.events.emit(AgentEvent::ToolPlanned {
                        tool: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    });
                }
                state.log.push(ChatMessage::assistant_with_calls(content, calls));
            }
            Ok(Reply::Text(text)) => {
                tracing::info!(len = text.len(), "oracle replied with text");
                state.log.push(ChatMessage::assistant(text));
            }
            Err(e) => {
                tracing::error!(step = state.step, "oracle failed: {e}");
                state.log.push(ChatMessage::assistant(format!("I encountered an error: {e}")));
                state.status = RunStatus::Error;
                state.end_reason = Some(EndReason::OracleError);
            }
        }
    }

    /// One oracle call, plus a single corrective retry on a malformed reply.
    async fn ask_oracle(&self, state: &mut AgentState) -> DroidClawResult<Reply> {
        let reply = self.call_oracle(state).await?;
        match interpret_reply(&reply) {
            Ok(r) => Ok(r),
            Err(DroidClawError::OracleResponseFormat(reason)) => {
                tracing::warn!(%reason, "malformed oracle reply, re-prompting once");
                state.log.push(ChatMessage::assistant(reply.content));
                state.log.push(ChatMessage::user(CORRECTIVE_PROMPT));
                let retry = self.call_oracle(state).await?;
                interpret_reply(&retry)
            }
            Err(e) => Err(e),
        }
    }

    async fn call_oracle(&self, state: &AgentState) -> DroidClawResult<LlmResponse> {
        let messages = self.build_messages(state);
        tracing::debug!(messages = messages.len(), model = %self.call_cfg.model, "calling oracle");
        self.provider
            .chat(messages, self.tools.clone(), &self.call_cfg)
            .await
    }

    fn build_messages(&self, state: &AgentState) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(state.log.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(state.log.messages().cloned());
        if state.step > 1 {
            if let Some(block) = context_block(state, self.settings.screen_summary_chars) {
                messages.push(ChatMessage::user(block));
            }
        }
        messages
    }

    fn human_review(&self, state: &mut AgentState) {
        let pending = state
            .log
            .pending_tool_calls()
            .map(|calls| serde_json::to_string_pretty(calls).unwrap_or_default())
            .unwrap_or_default();
        tracing::info!(step = state.step, "awaiting human confirmation");
        self.events.emit(AgentEvent::ConfirmationRequired {
            summary: pending.clone(),
        });
        state.pending_confirmation = Some(pending);
        state.status = RunStatus::NeedsInput;
        state.end_reason = Some(EndReason::AwaitingConfirmation);
    }

    async fn act(&mut self, state: &mut AgentState) {
        let Some(calls) = state.log.pending_tool_calls().map(<[_]>::to_vec) else {
            state.status = RunStatus::Completed;
            return;
        };

        let mut terminal_message = None;
        for (i, call) in calls.iter().enumerate() {
            let name = call.function.name.as_str();
            let outcome = match parse_tool_call(name, &call.function.arguments) {
                Ok(op) => {
                    let outcome = invoke(&self.ctx, &op, &mut self.registry).await;
                    if let ToolOp::Device(action) = &op {
                        if action.is_terminal() && outcome.ok {
                            terminal_message = Some(outcome.message.clone());
                        }
                    }
                    outcome
                }
                Err(e) => ActionOutcome {
                    ok: false,
                    message: e.to_string(),
                },
            };

            tracing::info!(step = state.step, tool = name, ok = outcome.ok, "tool executed");
            self.events.emit(AgentEvent::ToolExecuted {
                tool: name.to_string(),
                ok: outcome.ok,
                result: outcome.message.clone(),
            });
            if i == 0 {
                state.last_action = Some(name.to_string());
                state.last_result = Some(outcome.message.clone());
            }
            state.log.push(ChatMessage::tool(&call.id, outcome.message));
        }

        state.status = RunStatus::Running;
        if let Some(message) = terminal_message {
            state.final_message = Some(message);
            state.status = RunStatus::Completed;
            state.end_reason = Some(EndReason::Completed);
        }
    }

    fn route_after_reason(&self, state: &AgentState) -> Node {
        if state.status.is_terminal() {
            return Node::End;
        }
        if let Some(calls) = state.log.pending_tool_calls() {
            let gated = self.settings.confirm_actions
                && calls
                    .iter()
                    .any(|c| requires_approval(&c.function.name, &self.settings.require_approval_for));
            return if gated { Node::HumanReview } else { Node::Act };
        }
        match state.log.last() {
            Some(last) if last.role == "tool" && !self.loop_ctrl.reached(state.step) => Node::Perceive,
            _ => Node::End,
        }
    }

    fn route_after_act(&self, state: &AgentState) -> Node {
        if state.status == RunStatus::Completed || self.loop_ctrl.reached(state.step) {
            Node::End
        } else {
            Node::Perceive
        }
    }

    fn finish(&self, mut state: AgentState) -> RunReport {
        if state.status == RunStatus::Running {
            state.status = RunStatus::Completed;
        }
        if state.end_reason.is_none() {
            let at_ceiling = self.loop_ctrl.reached(state.step) && state.log.pending_tool_calls().is_none()
                && state.log.last().map(|m| m.role == "tool").unwrap_or(false);
            state.end_reason = Some(if at_ceiling {
                EndReason::StepLimit
            } else {
                EndReason::Completed
            });
        }

        let report = self.report(&state);
        tracing::info!(
            status = ?report.status,
            end_reason = ?report.end_reason,
            steps = report.steps,
            "run finished"
        );
        self.events.emit(AgentEvent::Finished {
            run_id: report.run_id.clone(),
            status: report.status,
            end_reason: report.end_reason,
            message: report.message.clone(),
        });
        report
    }

    fn report(&self, state: &AgentState) -> RunReport {
        let message = state
            .final_message
            .clone()
            .or_else(|| state.log.last_assistant_text().map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        RunReport {
            run_id: state.run_id.clone(),
            status: state.status,
            end_reason: state.end_reason.unwrap_or(EndReason::Completed),
            steps: state.step,
            message,
            pending_confirmation: state.pending_confirmation.clone(),
        }
    }
}

/// Context appended to the oracle request from the second step on: previous
/// action and result, foreground app and a truncated screen summary.
fn context_block(state: &AgentState, max_screen_chars: usize) -> Option<String> {
    let mut parts = Vec::new();

    if let (Some(action), Some(result)) = (&state.last_action, &state.last_result) {
        parts.push(format!("[Previous action]: {action}"));
        parts.push(format!("[Result]: {result}"));
        if result.starts_with("Opened") && state.goal.to_lowercase().contains("open") {
            parts.push("[Status]: App was successfully opened. Respond to confirm completion.".to_string());
        }
    }

    if !state.current_app.is_empty() {
        parts.push(format!("[Current app on screen]: {}", state.current_app));
    }

    if !state.current_screen.is_empty() {
        let screen: String = state.current_screen.chars().take(max_screen_chars).collect();
        parts.push(format!("[Screen UI elements]:\n{screen}"));
    }

    (!parts.is_empty()).then(|| parts.join("\n"))
}
