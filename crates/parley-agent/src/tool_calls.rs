// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human approval of model-requested tool calls.

use std::collections::HashSet;

use parley_core::host::ChatPost;
use parley_core::{LlmContext, ParleyError, ToolCall, ToolCallStatus, ToolResolver};
use tracing::{info, warn};

use crate::props;

pub const REJECTED_RESULT: &str = "Tool call rejected by user";
pub const FAILED_RESULT: &str = "Tool call failed";

/// Fails unless `user_id` is the user whose request produced `post`.
pub fn ensure_requester(post: &ChatPost, user_id: &str) -> Result<(), ParleyError> {
    match post.prop_str(props::REQUESTER) {
        Some(requester) if requester == user_id => Ok(()),
        _ => Err(ParleyError::Forbidden(format!(
            "only the original requester may act on post {}",
            post.id
        ))),
    }
}

/// Every tool call recorded on `post`, whatever its status.
pub fn stored_calls(post: &ChatPost) -> Result<Vec<ToolCall>, ParleyError> {
    let raw = post
        .prop_str(props::PENDING_TOOL_CALL)
        .ok_or_else(|| ParleyError::InvalidInput(format!("post {} has no tool calls", post.id)))?;
    Ok(serde_json::from_str(raw)?)
}

/// The tool calls on `post`, provided some still await a decision.
///
/// Calls that were already resolved are never run again.
pub fn pending_calls(post: &ChatPost) -> Result<Vec<ToolCall>, ParleyError> {
    let calls = stored_calls(post)?;
    if !calls.iter().any(|c| c.status == ToolCallStatus::Pending) {
        return Err(ParleyError::InvalidInput(format!(
            "tool calls on post {} were already resolved",
            post.id
        )));
    }
    Ok(calls)
}

/// Runs accepted pending calls and rejects the other pending ones.
///
/// Calls with a recorded outcome pass through unchanged. A failing tool is
/// recorded as an error with a fixed result text; the underlying error is
/// only logged.
pub async fn resolve_calls(
    tools: &dyn ToolResolver,
    calls: Vec<ToolCall>,
    accepted: &HashSet<String>,
    context: &LlmContext,
) -> Vec<ToolCall> {
    let mut resolved = Vec::with_capacity(calls.len());
    for mut call in calls {
        if call.status != ToolCallStatus::Pending {
            resolved.push(call);
            continue;
        }
        if accepted.contains(&call.id) {
            match tools.resolve_tool(&call.name, &call.arguments, context).await {
                Ok(result) => {
                    info!(tool = %call.name, "tool call succeeded");
                    call.result = result;
                    call.status = ToolCallStatus::Success;
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "tool call failed");
                    call.result = FAILED_RESULT.to_string();
                    call.status = ToolCallStatus::Error;
                }
            }
        } else {
            call.result = REJECTED_RESULT.to_string();
            call.status = ToolCallStatus::Rejected;
        }
        resolved.push(call);
    }
    resolved
}

/// Writes resolved calls back onto `post`.
pub fn record_calls(post: &mut ChatPost, calls: &[ToolCall]) -> Result<(), ParleyError> {
    post.set_prop(props::PENDING_TOOL_CALL, serde_json::to_string(calls)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::ToolSpec;
    use serde_json::{Value, json};

    struct Tools;

    #[async_trait]
    impl ToolResolver for Tools {
        fn tool_specs(&self) -> Vec<ToolSpec> {
            Vec::new()
        }

        async fn resolve_tool(
            &self,
            name: &str,
            arguments: &Value,
            _context: &LlmContext,
        ) -> Result<String, ParleyError> {
            match name {
                "echo" => Ok(arguments["text"].as_str().unwrap_or_default().to_string()),
                _ => Err(ParleyError::UnknownTool(name.to_string())),
            }
        }
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            arguments: json!({"text": "hello"}),
            result: String::new(),
            status: ToolCallStatus::Pending,
        }
    }

    #[tokio::test]
    async fn accepted_calls_run_and_others_are_rejected() {
        let accepted: HashSet<String> = ["1".to_string(), "2".to_string()].into();
        let resolved = resolve_calls(
            &Tools,
            vec![call("1", "echo"), call("2", "missing"), call("3", "echo")],
            &accepted,
            &LlmContext::default(),
        )
        .await;

        assert_eq!(resolved[0].status, ToolCallStatus::Success);
        assert_eq!(resolved[0].result, "hello");
        assert_eq!(resolved[1].status, ToolCallStatus::Error);
        assert_eq!(resolved[1].result, FAILED_RESULT);
        assert_eq!(resolved[2].status, ToolCallStatus::Rejected);
        assert_eq!(resolved[2].result, REJECTED_RESULT);
    }

    #[test]
    fn recorded_calls_read_back_exactly() {
        let mut post = ChatPost::default();
        let calls = vec![ToolCall {
            status: ToolCallStatus::Rejected,
            result: REJECTED_RESULT.into(),
            ..call("1", "echo")
        }];
        record_calls(&mut post, &calls).unwrap();
        assert_eq!(stored_calls(&post).unwrap(), calls);
    }

    #[test]
    fn resolved_posts_have_nothing_pending() {
        let mut post = ChatPost {
            id: "p".into(),
            ..Default::default()
        };
        record_calls(&mut post, &[call("1", "echo")]).unwrap();
        assert_eq!(pending_calls(&post).unwrap().len(), 1);

        let done = ToolCall {
            status: ToolCallStatus::Success,
            result: "hello".into(),
            ..call("1", "echo")
        };
        record_calls(&mut post, &[done]).unwrap();
        assert!(matches!(
            pending_calls(&post),
            Err(ParleyError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn recorded_outcomes_are_kept() {
        let done = ToolCall {
            status: ToolCallStatus::Success,
            result: "earlier".into(),
            ..call("1", "echo")
        };
        let resolved = resolve_calls(
            &Tools,
            vec![done.clone(), call("2", "echo")],
            &HashSet::new(),
            &LlmContext::default(),
        )
        .await;

        assert_eq!(resolved[0], done);
        assert_eq!(resolved[1].status, ToolCallStatus::Rejected);
    }

    #[test]
    fn only_the_requester_may_act() {
        let mut post = ChatPost {
            id: "p".into(),
            ..Default::default()
        };
        post.set_prop(props::REQUESTER, "alice");
        assert!(ensure_requester(&post, "alice").is_ok());
        assert!(matches!(
            ensure_requester(&post, "mallory"),
            Err(ParleyError::Forbidden(_))
        ));
        assert!(pending_calls(&post).is_err());
    }
}
