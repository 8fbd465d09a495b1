use serde_json::{json, Value};

use crate::errors::{DroidClawError, DroidClawResult};
use crate::llm::types::{FunctionCall, LlmResponse, ToolCall};

/// Sent after a malformed reply, once, before giving up.
pub const CORRECTIVE_PROMPT: &str =
    "Your last reply could not be understood. Call one of the available tools, \
     or reply with ONLY a valid JSON action such as {\"action\": \"click\", \"target_uid\": 3}.";

/// What the oracle decided this step.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Free text; nothing more to do.
    Text(String),
    /// One or more tool invocations, with any text that came alongside them.
    Invocations { content: String, calls: Vec<ToolCall> },
}

/// Turns a raw chat reply into a [`Reply`].
///
/// Native tool calls win. Otherwise the text (or, when the text is empty, the
/// reasoning field) is checked for a JSON action in the legacy
/// `{"action": ..., "target_uid": ...}` format, which becomes a synthetic
/// invocation. Empty replies and broken JSON actions are format errors.
pub fn interpret_reply(resp: &LlmResponse) -> DroidClawResult<Reply> {
    if !resp.tool_calls.is_empty() {
        for call in &resp.tool_calls {
            let args = call.function.arguments.trim();
            if args.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(args) {
                Ok(Value::Object(_)) => {}
                _ => {
                    return Err(DroidClawError::OracleResponseFormat(format!(
                        "arguments of {} are not a JSON object: {args}",
                        call.function.name
                    )))
                }
            }
        }
        return Ok(Reply::Invocations {
            content: resp.content.clone(),
            calls: resp.tool_calls.clone(),
        });
    }

    let text = effective_text(resp);
    if text.is_empty() {
        return Err(DroidClawError::OracleResponseFormat("empty reply".into()));
    }

    if looks_like_json_action(&text) {
        let call = parse_json_action(&text)?;
        tracing::debug!(tool = %call.function.name, "JSON action reply converted to tool call");
        let content = reasoning_of(&text).unwrap_or_default();
        return Ok(Reply::Invocations {
            content,
            calls: vec![call],
        });
    }

    Ok(Reply::Text(text))
}

/// Content, or the reasoning field when some local models leave content empty.
fn effective_text(resp: &LlmResponse) -> String {
    let content = resp.content.trim();
    if !content.is_empty() {
        return content.to_string();
    }
    let reasoning = resp.reasoning.trim();
    match (reasoning.find('{'), reasoning.rfind('}')) {
        (Some(start), Some(end)) if end > start => reasoning[start..=end].to_string(),
        _ => reasoning.to_string(),
    }
}

fn looks_like_json_action(text: &str) -> bool {
    text.starts_with('{') || text.starts_with("```")
}

/// The JSON object inside `text`, stripped of code fences and surrounding prose.
fn extract_json(text: &str) -> &str {
    let mut body = text.trim();
    if body.starts_with("```") {
        body = body.trim_start_matches('`');
        // Drop the info string (`json`) on the fence line.
        body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or(body);
        body = body.trim_end().trim_end_matches('`');
    }
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => body.trim(),
    }
}

fn parse_json_action(text: &str) -> DroidClawResult<ToolCall> {
    let body = extract_json(text);
    let data: Value = serde_json::from_str(body)
        .map_err(|e| DroidClawError::OracleResponseFormat(format!("invalid JSON action: {e}")))?;
    let Value::Object(obj) = data else {
        return Err(DroidClawError::OracleResponseFormat(
            "JSON action is not an object".into(),
        ));
    };

    let action = obj.get("action").and_then(Value::as_str).unwrap_or("done");
    let field = |key: &str| obj.get(key).filter(|v| !v.is_null()).cloned();

    let arguments = match action {
        "click" => json!({ "id": field("target_uid") }),
        "type" => json!({ "text": field("text") }),
        "scroll" => json!({ "direction": field("direction") }),
        "open_app" => json!({ "package": field("app_package") }),
        "done" | "respond" | "ask" => json!({ "message": field("message") }),
        _ => json!({}),
    };

    Ok(ToolCall {
        id: "json_action".into(),
        call_type: "function".into(),
        function: FunctionCall {
            name: action.to_string(),
            arguments: arguments.to_string(),
        },
    })
}

fn reasoning_of(text: &str) -> Option<String> {
    let data: Value = serde_json::from_str(extract_json(text)).ok()?;
    data.get("reasoning")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::Action;
    use crate::agent_engine::toolbox::{parse_tool_call, ToolOp};

    fn text(content: &str) -> LlmResponse {
        LlmResponse {
            content: content.into(),
            ..LlmResponse::default()
        }
    }

    fn single_call(reply: Reply) -> ToolCall {
        match reply {
            Reply::Invocations { mut calls, .. } => {
                assert_eq!(calls.len(), 1);
                calls.remove(0)
            }
            other => panic!("expected invocation, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_is_terminal_text() {
        assert_eq!(
            interpret_reply(&text("Opened Spotify.")).unwrap(),
            Reply::Text("Opened Spotify.".into())
        );
    }

    #[test]
    fn native_calls_pass_through() {
        let resp = LlmResponse {
            tool_calls: vec![ToolCall {
                id: "c1".into(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: "home".into(),
                    arguments: String::new(),
                },
            }],
            ..LlmResponse::default()
        };
        let call = single_call(interpret_reply(&resp).unwrap());
        assert_eq!(call.id, "c1");
    }

    #[test]
    fn non_object_arguments_are_format_errors() {
        let resp = LlmResponse {
            tool_calls: vec![ToolCall {
                id: "c1".into(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: "click".into(),
                    arguments: "3".into(),
                },
            }],
            ..LlmResponse::default()
        };
        assert!(matches!(
            interpret_reply(&resp),
            Err(DroidClawError::OracleResponseFormat(_))
        ));
    }

    #[test]
    fn json_action_becomes_invocation() {
        let reply = interpret_reply(&text(
            r#"{"action": "click", "target_uid": 45, "reasoning": "date picker"}"#,
        ))
        .unwrap();
        match &reply {
            Reply::Invocations { content, .. } => assert_eq!(content, "date picker"),
            other => panic!("unexpected {other:?}"),
        }
        let call = single_call(reply);
        assert_eq!(
            parse_tool_call(&call.function.name, &call.function.arguments).unwrap(),
            ToolOp::Device(Action::Click { target: Some(45) })
        );
    }

    #[test]
    fn fenced_json_action() {
        let reply = interpret_reply(&text(
            "```json\n{\"action\": \"open_app\", \"app_package\": \"com.spotify.music\"}\n```",
        ))
        .unwrap();
        let call = single_call(reply);
        assert_eq!(
            parse_tool_call(&call.function.name, &call.function.arguments).unwrap(),
            ToolOp::Device(Action::OpenApp {
                package: Some("com.spotify.music".into())
            })
        );
    }

    #[test]
    fn reasoning_field_is_used_when_content_is_empty() {
        let resp = LlmResponse {
            reasoning: r#"I should answer. {"action": "respond", "message": "3 apps"}"#.into(),
            ..LlmResponse::default()
        };
        let call = single_call(interpret_reply(&resp).unwrap());
        assert_eq!(call.function.name, "respond");
        assert_eq!(
            parse_tool_call("respond", &call.function.arguments).unwrap(),
            ToolOp::Device(Action::Respond {
                message: Some("3 apps".into())
            })
        );
    }

    #[test]
    fn empty_and_broken_json_are_format_errors() {
        assert!(matches!(
            interpret_reply(&text("   ")),
            Err(DroidClawError::OracleResponseFormat(_))
        ));
        assert!(matches!(
            interpret_reply(&text("{\"action\": \"click\", ")),
            Err(DroidClawError::OracleResponseFormat(_))
        ));
    }
}
