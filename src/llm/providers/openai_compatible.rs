use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::errors::{DroidClawError, DroidClawResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser::parse_sse_line;
use crate::llm::types::{
    CallConfig, ChatMessage, FunctionCall, LlmResponse, StreamChunk, StreamChunkKind, ToolCall, ToolDef,
};

/// Chat-completions client for OpenAI and every server speaking its dialect
/// (Ollama, LM Studio, vLLM, DeepSeek, ...).
pub struct OpenAiCompatibleProvider {
    id: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, endpoint: String, api_key: String, timeout: Duration) -> DroidClawResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            endpoint,
            api_key,
            client,
        })
    }

    fn request_body(messages: &[ChatMessage], tools: &[ToolDef], cfg: &CallConfig) -> DroidClawResult<Value> {
        let mut body = json!({
            "model": cfg.model,
            "messages": messages,
            "stream": cfg.stream,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)?;
            body["tool_choice"] = json!("auto");
        }
        Ok(body)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDef>,
        cfg: &CallConfig,
    ) -> DroidClawResult<LlmResponse> {
        let body = Self::request_body(&messages, &tools, cfg)?;
        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            messages = messages.len(),
            tools = tools.len(),
            "oracle request"
        );

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DroidClawError::Oracle(format!("{status}: {detail}")));
        }

        let reply = if cfg.stream {
            read_stream(response).await?
        } else {
            parse_json_reply(&response.json::<Value>().await?)
        };

        tracing::info!(
            provider = %self.id,
            content_len = reply.content.len(),
            reasoning_len = reply.reasoning.len(),
            tools = ?reply.tool_calls.iter().map(|c| c.function.name.as_str()).collect::<Vec<_>>(),
            "oracle reply"
        );
        Ok(reply)
    }
}

async fn read_stream(response: reqwest::Response) -> DroidClawResult<LlmResponse> {
    let mut bytes = response.bytes_stream();
    let mut lines = LineSplitter::default();
    let mut acc = StreamAccumulator::default();

    'stream: while let Some(next) = bytes.next().await {
        for line in lines.feed(&next?) {
            if !acc.consume_line(&line) {
                break 'stream;
            }
        }
    }
    if let Some(tail) = lines.finish() {
        acc.consume_line(&tail);
    }
    Ok(acc.finish())
}

/// Cuts a byte stream into trimmed, non-empty lines. Bytes are held until the
/// newline arrives so multi-byte characters split across network chunks
/// decode intact.
#[derive(Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    call_type: String,
    name: String,
    arguments: String,
}

/// Folds stream chunks into one reply. Tool-call fragments are merged by
/// their delta `index`.
#[derive(Debug, Default)]
struct StreamAccumulator {
    content: String,
    reasoning: String,
    calls: BTreeMap<usize, PartialCall>,
}

impl StreamAccumulator {
    /// Returns false once the stream signalled its end.
    fn consume_line(&mut self, line: &str) -> bool {
        match parse_sse_line(line) {
            Ok(chunks) => chunks.into_iter().all(|c| self.apply(c)),
            Err(e) => {
                tracing::debug!("SSE line skipped: {e}");
                true
            }
        }
    }

    fn apply(&mut self, chunk: StreamChunk) -> bool {
        match chunk.kind {
            StreamChunkKind::Reasoning => self.reasoning.push_str(&chunk.content),
            StreamChunkKind::Content => self.content.push_str(&chunk.content),
            StreamChunkKind::ToolCall => self.merge_call_deltas(&chunk.content),
            StreamChunkKind::Done => return false,
        }
        true
    }

    fn merge_call_deltas(&mut self, raw: &str) {
        let Ok(deltas) = serde_json::from_str::<Vec<Value>>(raw) else {
            tracing::debug!("unreadable tool-call delta dropped");
            return;
        };
        for delta in deltas {
            let index = delta["index"].as_u64().unwrap_or(0) as usize;
            let call = self.calls.entry(index).or_default();
            if let Some(id) = delta["id"].as_str().filter(|s| !s.is_empty()) {
                call.id = id.to_string();
            }
            if let Some(kind) = delta["type"].as_str().filter(|s| !s.is_empty()) {
                call.call_type = kind.to_string();
            }
            let function = &delta["function"];
            if let Some(name) = function["name"].as_str() {
                call.name.push_str(name);
            }
            if let Some(args) = function["arguments"].as_str() {
                call.arguments.push_str(args);
            }
        }
    }

    fn finish(self) -> LlmResponse {
        let tool_calls = self
            .calls
            .into_iter()
            .filter(|(_, c)| !c.name.is_empty())
            .map(|(index, c)| ToolCall {
                id: non_empty_or(c.id, || format!("call_{index}")),
                call_type: non_empty_or(c.call_type, || "function".to_string()),
                function: FunctionCall {
                    name: c.name,
                    arguments: if c.arguments.trim().is_empty() {
                        "{}".to_string()
                    } else {
                        c.arguments
                    },
                },
            })
            .collect();
        LlmResponse {
            content: self.content,
            reasoning: self.reasoning,
            tool_calls,
        }
    }
}

fn non_empty_or(value: String, fallback: impl FnOnce() -> String) -> String {
    if value.is_empty() {
        fallback()
    } else {
        value
    }
}

/// Content, reasoning and tool calls of a non-streaming completion body.
fn parse_json_reply(body: &Value) -> LlmResponse {
    let message = &body["choices"][0]["message"];
    let text = |key: &str| message[key].as_str().unwrap_or_default().to_string();

    let reasoning = match message["reasoning_content"].as_str() {
        Some(r) => r.to_string(),
        None => text("reasoning"),
    };

    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .enumerate()
                .filter_map(|(i, raw)| tool_call_from_json(i, raw))
                .collect()
        })
        .unwrap_or_default();

    LlmResponse {
        content: text("content"),
        reasoning,
        tool_calls,
    }
}

fn tool_call_from_json(index: usize, raw: &Value) -> Option<ToolCall> {
    let function = &raw["function"];
    let name = function["name"].as_str().filter(|n| !n.is_empty())?;
    // Some servers send the arguments as an object rather than a string.
    let arguments = match &function["arguments"] {
        Value::String(s) => s.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    Some(ToolCall {
        id: raw["id"]
            .as_str()
            .map_or_else(|| format!("call_{index}"), str::to_string),
        call_type: raw["type"].as_str().unwrap_or("function").to_string(),
        function: FunctionCall {
            name: name.to_string(),
            arguments,
        },
    })
}
