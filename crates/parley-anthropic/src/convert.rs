// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of provider-neutral conversations into Anthropic messages.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parley_core::{FileAttachment, Post, Role, ToolCallStatus};

use crate::types::{ApiContent, ApiContentBlock, ApiMessage, ImageSource};

/// Largest inline image accepted by the API.
pub const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;

const SUPPORTED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Splits `posts` into a top-level system prompt and alternating messages.
///
/// System turns are concatenated into the system prompt. Consecutive turns
/// with the same role are merged into one message, preserving block order.
/// Assistant tool calls become `tool_use` blocks followed by a user message
/// holding one `tool_result` per call.
pub fn to_api_messages(posts: &[Post], enable_vision: bool) -> (Option<String>, Vec<ApiMessage>) {
    let mut system: Vec<&str> = Vec::new();
    let mut messages: Vec<ApiMessage> = Vec::new();

    for post in posts {
        match post.role {
            Role::System => {
                if !post.message.trim().is_empty() {
                    system.push(&post.message);
                }
            }
            Role::User => {
                let mut blocks = text_block(&post.message);
                if enable_vision {
                    blocks.extend(post.files.iter().filter_map(image_block));
                }
                push_blocks(&mut messages, "user", blocks);
            }
            Role::Assistant => {
                let mut blocks = text_block(&post.message);
                blocks.extend(post.tool_use.iter().map(|call| ApiContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                }));
                push_blocks(&mut messages, "assistant", blocks);

                if !post.tool_use.is_empty() {
                    let results = post
                        .tool_use
                        .iter()
                        .map(|call| ApiContentBlock::ToolResult {
                            tool_use_id: call.id.clone(),
                            content: call.result.clone(),
                            is_error: matches!(
                                call.status,
                                ToolCallStatus::Error | ToolCallStatus::Rejected
                            )
                            .then_some(true),
                        })
                        .collect();
                    push_blocks(&mut messages, "user", results);
                }
            }
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, messages)
}

fn text_block(text: &str) -> Vec<ApiContentBlock> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![ApiContentBlock::Text {
            text: text.to_string(),
        }]
    }
}

fn push_blocks(messages: &mut Vec<ApiMessage>, role: &str, blocks: Vec<ApiContentBlock>) {
    if blocks.is_empty() {
        return;
    }
    match messages.last_mut() {
        Some(last) if last.role == role => {
            let previous = std::mem::replace(&mut last.content, ApiContent::Blocks(Vec::new()));
            let mut merged = previous.into_blocks();
            merged.extend(blocks);
            last.content = ApiContent::Blocks(merged);
        }
        _ => messages.push(ApiMessage {
            role: role.to_string(),
            content: single_text_or_blocks(blocks),
        }),
    }
}

fn single_text_or_blocks(mut blocks: Vec<ApiContentBlock>) -> ApiContent {
    if blocks.len() == 1
        && let ApiContentBlock::Text { text } = &mut blocks[0]
    {
        return ApiContent::Text(std::mem::take(text));
    }
    ApiContent::Blocks(blocks)
}

/// Inline image block for an attachment, or a text placeholder when the
/// image cannot be sent. Non-image files produce nothing.
fn image_block(file: &FileAttachment) -> Option<ApiContentBlock> {
    if !file.mime_type.starts_with("image/") {
        return None;
    }
    if !SUPPORTED_IMAGE_TYPES.contains(&file.mime_type.as_str()) {
        return Some(ApiContentBlock::Text {
            text: format!("[Unsupported image type: {}]", file.mime_type),
        });
    }
    if file.size > MAX_IMAGE_SIZE || file.data.len() as u64 > MAX_IMAGE_SIZE {
        return Some(ApiContentBlock::Text {
            text: format!("[Image too large: {}]", file.name),
        });
    }
    Some(ApiContentBlock::Image {
        source: ImageSource {
            source_type: "base64".to_string(),
            media_type: file.mime_type.clone(),
            data: STANDARD.encode(&file.data),
        },
    })
}
