use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::state::{EndReason, RunStatus};

/// Progress notifications emitted while a run advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    StepStarted {
        run_id: String,
        step: u32,
        package: Option<String>,
    },
    Thinking {
        step: u32,
    },
    ToolPlanned {
        tool: String,
        arguments: String,
    },
    ToolExecuted {
        tool: String,
        ok: bool,
        result: String,
    },
    ConfirmationRequired {
        summary: String,
    },
    Finished {
        run_id: String,
        status: RunStatus,
        end_reason: EndReason,
        message: String,
    },
}

/// Fan-out channel for [`AgentEvent`]s. Sending never blocks and never fails
/// the run; events sent with no subscriber are dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AgentEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("agent event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(AgentEvent::Thinking { step: 1 });
        bus.emit(AgentEvent::ConfirmationRequired {
            summary: "click {\"id\":3}".into(),
        });

        assert!(matches!(rx.recv().await.unwrap(), AgentEvent::Thinking { step: 1 }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            AgentEvent::ConfirmationRequired { .. }
        ));
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        EventBus::new().emit(AgentEvent::Thinking { step: 3 });
    }
}
