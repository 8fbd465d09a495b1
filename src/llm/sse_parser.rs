use serde_json::Value;

use crate::errors::{DroidClawError, DroidClawResult};
use crate::llm::types::{StreamChunk, StreamChunkKind};

/// Parses one server-sent-events line of an OpenAI-compatible stream.
///
/// A single delta may carry reasoning, content and tool-call fragments at
/// once, so every non-empty part becomes its own chunk, in that order.
/// Keep-alives, comments and non-`data:` lines yield nothing.
pub fn parse_sse_line(line: &str) -> DroidClawResult<Vec<StreamChunk>> {
    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return Ok(Vec::new());
    };
    if data == "[DONE]" {
        return Ok(vec![chunk(StreamChunkKind::Done, String::new())]);
    }

    let json: Value = serde_json::from_str(data).map_err(|e| DroidClawError::SseParsing(e.to_string()))?;
    let Some(choice) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Ok(Vec::new());
    };
    let delta = &choice["delta"];

    let mut chunks = Vec::new();

    // DeepSeek uses `reasoning_content`, several local servers `reasoning`.
    if let Some(text) = ["reasoning_content", "reasoning"]
        .iter()
        .find_map(|k| delta[*k].as_str().filter(|s| !s.is_empty()))
    {
        chunks.push(chunk(StreamChunkKind::Reasoning, text.to_string()));
    }

    if let Some(text) = delta["content"].as_str().filter(|s| !s.is_empty()) {
        chunks.push(chunk(StreamChunkKind::Content, text.to_string()));
    }

    if let Some(calls) = delta["tool_calls"].as_array().filter(|c| !c.is_empty()) {
        let raw = serde_json::to_string(calls).map_err(|e| DroidClawError::SseParsing(e.to_string()))?;
        chunks.push(chunk(StreamChunkKind::ToolCall, raw));
    }

    if choice["finish_reason"].is_string() {
        chunks.push(chunk(StreamChunkKind::Done, String::new()));
    }

    Ok(chunks)
}

fn chunk(kind: StreamChunkKind, content: String) -> StreamChunk {
    StreamChunk { kind, content }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(line: &str) -> Vec<String> {
        parse_sse_line(line)
            .unwrap()
            .into_iter()
            .map(|c| format!("{:?}:{}", c.kind, c.content))
            .collect()
    }

    #[test]
    fn keepalives_and_foreign_lines_are_skipped() {
        assert!(kinds("").is_empty());
        assert!(kinds(": ping").is_empty());
        assert!(kinds("event: message").is_empty());
        assert!(kinds(r#"data: {"id":"x","choices":[]}"#).is_empty());
    }

    #[test]
    fn content_reasoning_and_done() {
        assert_eq!(kinds(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#), vec!["Content:Hi"]);
        assert_eq!(
            kinds(r#"data: {"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#),
            vec!["Reasoning:hmm"]
        );
        assert_eq!(
            kinds(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            vec!["Done:"]
        );
        assert_eq!(kinds("data: [DONE]"), vec!["Done:"]);
    }

    #[test]
    fn mixed_delta_keeps_every_part() {
        assert_eq!(
            kinds(r#"data: {"choices":[{"delta":{"reasoning":"think","content":"ok"},"finish_reason":"stop"}]}"#),
            vec!["Reasoning:think", "Content:ok", "Done:"]
        );
    }

    #[test]
    fn tool_call_delta_is_forwarded_as_json() {
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"back","arguments":""}}]}}]}"#;
        let chunks = parse_sse_line(line).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0].kind, StreamChunkKind::ToolCall));
        let v: Value = serde_json::from_str(&chunks[0].content).unwrap();
        assert_eq!(v[0]["function"]["name"], "back");
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            parse_sse_line("data: {nope"),
            Err(DroidClawError::SseParsing(_))
        ));
    }
}
