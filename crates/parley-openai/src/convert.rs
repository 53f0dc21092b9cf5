// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of provider-neutral conversations into chat messages.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parley_core::{FileAttachment, Post, Role};

use crate::types::{ChatMessage, ChatToolCall, ContentPart, FunctionCall, ImageUrl, MessageContent};

/// Largest inline image passed to the model.
pub const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;

const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Converts `posts` into chat messages in order.
///
/// System turns stay as leading `system` messages. Assistant tool calls are
/// followed by one `tool` message per call carrying its result.
pub fn to_chat_messages(posts: &[Post], enable_vision: bool) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(posts.len());

    for post in posts {
        match post.role {
            Role::System => messages.push(ChatMessage::text("system", &post.message)),
            Role::User => {
                let images: Vec<ContentPart> = if enable_vision {
                    post.files.iter().filter_map(image_part).collect()
                } else {
                    Vec::new()
                };
                if images.is_empty() {
                    messages.push(ChatMessage::text("user", &post.message));
                } else {
                    let mut parts = vec![ContentPart::Text {
                        text: post.message.clone(),
                    }];
                    parts.extend(images);
                    messages.push(ChatMessage {
                        role: "user".to_string(),
                        content: Some(MessageContent::Parts(parts)),
                        tool_calls: Vec::new(),
                        tool_call_id: None,
                    });
                }
            }
            Role::Assistant if post.tool_use.is_empty() => {
                messages.push(ChatMessage::text("assistant", &post.message));
            }
            Role::Assistant => {
                messages.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: (!post.message.is_empty())
                        .then(|| MessageContent::Text(post.message.clone())),
                    tool_calls: post
                        .tool_use
                        .iter()
                        .map(|call| ChatToolCall {
                            id: call.id.clone(),
                            call_type: "function".to_string(),
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect(),
                    tool_call_id: None,
                });
                for call in &post.tool_use {
                    messages.push(ChatMessage {
                        role: "tool".to_string(),
                        content: Some(MessageContent::Text(call.result.clone())),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(call.id.clone()),
                    });
                }
            }
        }
    }

    messages
}

fn image_part(file: &FileAttachment) -> Option<ContentPart> {
    if !file.mime_type.starts_with("image/") {
        return None;
    }
    if !SUPPORTED_IMAGE_TYPES.contains(&file.mime_type.as_str()) {
        return Some(ContentPart::Text {
            text: format!("[Unsupported image type: {}]", file.mime_type),
        });
    }
    if file.size > MAX_IMAGE_SIZE || file.data.len() as u64 > MAX_IMAGE_SIZE {
        return Some(ContentPart::Text {
            text: format!("[Image too large: {}]", file.name),
        });
    }
    Some(ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: format!("data:{};base64,{}", file.mime_type, STANDARD.encode(&file.data)),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{ToolCall, ToolCallStatus};
    use serde_json::json;

    #[test]
    fn system_turn_stays_in_sequence() {
        let messages = to_chat_messages(&[Post::system("rules"), Post::user("hi")], false);
        assert_eq!(messages[0], ChatMessage::text("system", "rules"));
        assert_eq!(messages[1], ChatMessage::text("user", "hi"));
    }

    #[test]
    fn tool_use_expands_into_call_and_results() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "GetJiraIssue".into(),
            description: String::new(),
            arguments: json!({"issue_keys": ["ABC-1"]}),
            result: "ABC-1: broken build".into(),
            status: ToolCallStatus::Success,
        };
        let messages = to_chat_messages(&[Post::assistant("").with_tool_use(vec![call])], false);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.is_none());
        assert_eq!(
            messages[0].tool_calls[0].function.arguments,
            r#"{"issue_keys":["ABC-1"]}"#
        );
        assert_eq!(messages[1].role, "tool");
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn vision_images_become_data_urls() {
        let post = Post::user("what is this").with_files(vec![
            FileAttachment {
                name: "a.png".into(),
                mime_type: "image/png".into(),
                size: 3,
                data: vec![1, 2, 3],
            },
            FileAttachment {
                name: "a.tiff".into(),
                mime_type: "image/tiff".into(),
                size: 3,
                data: vec![1, 2, 3],
            },
        ]);
        let messages = to_chat_messages(&[post], true);
        match &messages[0].content {
            Some(MessageContent::Parts(parts)) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(
                    parts[1],
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/png;base64,AQID".into()
                        }
                    }
                );
                assert_eq!(
                    parts[2],
                    ContentPart::Text {
                        text: "[Unsupported image type: image/tiff]".into()
                    }
                );
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }
}
