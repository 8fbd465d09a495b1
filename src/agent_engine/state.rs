use serde::{Deserialize, Serialize};

use crate::agent_engine::history::ConversationLog;

/// Nodes of the perceive → reason → act cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Perceive,
    Reason,
    HumanReview,
    Act,
    End,
}

/// One discrete thing the executor can do. Produced once per reasoning step,
/// consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Click { target: Option<u32> },
    Type { text: Option<String> },
    Scroll { direction: Option<String> },
    OpenApp { package: Option<String> },
    Back,
    Home,
    Wait { seconds: Option<u64> },
    Done { message: Option<String> },
    Respond { message: Option<String> },
    Ask { message: Option<String> },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Scroll { .. } => "scroll",
            Action::OpenApp { .. } => "open_app",
            Action::Back => "back",
            Action::Home => "home",
            Action::Wait { .. } => "wait",
            Action::Done { .. } => "done",
            Action::Respond { .. } => "respond",
            Action::Ask { .. } => "ask",
        }
    }

    /// Actions that hand control back to the user and end the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Done { .. } | Action::Respond { .. } | Action::Ask { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    NeedsInput,
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Completed,
    StepLimit,
    OracleError,
    AwaitingConfirmation,
}

/// Mutable state of one run. Only the engine's nodes touch it.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub run_id: String,
    pub goal: String,
    pub log: ConversationLog,
    pub current_screen: String,
    pub current_app: String,
    pub step: u32,
    pub last_action: Option<String>,
    pub last_result: Option<String>,
    pub status: RunStatus,
    /// Pretty-printed invocation(s) awaiting human approval.
    pub pending_confirmation: Option<String>,
    /// Set by a terminal action (`done`/`respond`/`ask`).
    pub final_message: Option<String>,
    pub end_reason: Option<EndReason>,
}

impl AgentState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            log: ConversationLog::default(),
            current_screen: String::new(),
            current_app: String::new(),
            step: 0,
            last_action: None,
            last_result: None,
            status: RunStatus::Running,
            pending_confirmation: None,
            final_message: None,
            end_reason: None,
        }
    }
}

/// What the caller sees when a run stops or pauses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub end_reason: EndReason,
    pub steps: u32,
    pub message: String,
    pub pending_confirmation: Option<String>,
}
