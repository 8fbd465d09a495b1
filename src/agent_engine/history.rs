use chrono::{DateTime, Utc};

use crate::llm::types::{ChatMessage, ToolCall};

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub message: ChatMessage,
}

/// Append-only, in-memory conversation of one run. Its order is the oracle's context.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<LogEntry>,
}

impl ConversationLog {
    pub fn push(&mut self, message: ChatMessage) {
        tracing::trace!(role = %message.role, len = self.entries.len() + 1, "log append");
        self.entries.push(LogEntry {
            ts: Utc::now(),
            message,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last().map(|e| &e.message)
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl DoubleEndedIterator<Item = &ChatMessage> {
        self.entries.iter().map(|e| &e.message)
    }

    /// Tool invocations of the latest entry, if it is an assistant turn carrying any.
    pub fn pending_tool_calls(&self) -> Option<&[ToolCall]> {
        let last = self.last()?;
        if last.role != "assistant" {
            return None;
        }
        last.tool_calls.as_deref().filter(|calls| !calls.is_empty())
    }

    /// Most recent non-empty assistant text.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages()
            .rev()
            .filter(|m| m.role == "assistant")
            .map(|m| m.content.as_str())
            .find(|c| !c.trim().is_empty())
    }
}
