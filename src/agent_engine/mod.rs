pub mod engine;
pub mod event_bus;
pub mod history;
pub mod loop_control;
pub mod reply;
pub mod state;
pub mod toolbox;

pub use engine::{AgentEngine, EngineSettings};
pub use event_bus::{AgentEvent, EventBus};
pub use state::{Action, EndReason, RunReport, RunStatus};
pub use toolbox::ToolContext;
