// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jira issue lookup, proxied through the Jira plugin.

use std::fmt::Write;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parley_core::host::PluginRequest;
use parley_core::{HostPlatform, LlmContext, ParleyError};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tool::{Tool, parse_args, schema_for, tool_error};

pub const JIRA_PLUGIN_ID: &str = "jira";

const MAX_KEY_CHARS: usize = 50;

/// Fields requested for every issue.
const FIELDS: &[&str] = &[
    "summary",
    "description",
    "status",
    "assignee",
    "reporter",
    "created",
    "updated",
    "issuetype",
    "priority",
    "labels",
];

static ISSUE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+-[0-9]+$").expect("issue key pattern is valid")
});

#[derive(Debug, Deserialize, JsonSchema)]
struct JiraIssueArgs {
    /// The Jira issue keys to retrieve, e.g. ["MM-1234"].
    issue_keys: Vec<String>,
}

pub struct GetJiraIssue {
    host: Arc<dyn HostPlatform>,
}

impl GetJiraIssue {
    pub fn new(host: Arc<dyn HostPlatform>) -> Self {
        Self { host }
    }
}

pub fn is_valid_issue_key(key: &str) -> bool {
    key.len() <= MAX_KEY_CHARS && ISSUE_KEY.is_match(key)
}

fn field_str<'a>(fields: &'a Value, key: &str) -> &'a str {
    match &fields[key] {
        Value::String(s) => s,
        Value::Object(o) => o
            .get("name")
            .or_else(|| o.get("displayName"))
            .and_then(Value::as_str)
            .unwrap_or(""),
        _ => "",
    }
}

fn format_issue(key: &str, issue: &Value) -> String {
    let fields = &issue["fields"];
    let mut out = String::new();
    let _ = writeln!(out, "Issue: {key}");
    for (label, field) in [
        ("Summary", "summary"),
        ("Type", "issuetype"),
        ("Status", "status"),
        ("Priority", "priority"),
        ("Assignee", "assignee"),
        ("Reporter", "reporter"),
        ("Created", "created"),
        ("Updated", "updated"),
    ] {
        let value = field_str(fields, field);
        if !value.is_empty() {
            let _ = writeln!(out, "{label}: {value}");
        }
    }
    if let Some(labels) = fields["labels"].as_array()
        && !labels.is_empty()
    {
        let labels: Vec<&str> = labels.iter().filter_map(Value::as_str).collect();
        let _ = writeln!(out, "Labels: {}", labels.join(", "));
    }
    let description = field_str(fields, "description");
    if !description.is_empty() {
        let _ = writeln!(out, "Description: {description}");
    }
    out.trim_end().to_string()
}

#[async_trait]
impl Tool for GetJiraIssue {
    fn name(&self) -> &str {
        "GetJiraIssue"
    }

    fn description(&self) -> &str {
        "Retrieve one or more Jira issues by key."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<JiraIssueArgs>()
    }

    async fn invoke(&self, arguments: &Value, context: &LlmContext) -> Result<String, ParleyError> {
        let args: JiraIssueArgs = parse_args(self.name(), arguments)?;
        if args.issue_keys.is_empty() {
            return Err(tool_error(self.name(), "no issue keys given"));
        }
        if let Some(bad) = args.issue_keys.iter().find(|k| !is_valid_issue_key(k)) {
            return Err(tool_error(self.name(), format!("invalid issue key {bad:?}")));
        }
        let user_id = context
            .requesting_user_id()
            .ok_or_else(|| tool_error(self.name(), "no requesting user"))?;

        let mut sections = Vec::with_capacity(args.issue_keys.len());
        for key in &args.issue_keys {
            let response = self
                .host
                .plugin_request(PluginRequest {
                    plugin_id: JIRA_PLUGIN_ID.to_string(),
                    method: "GET".to_string(),
                    path: format!("/api/v2/issue/{key}?fields={}", FIELDS.join(",")),
                    user_id: user_id.to_string(),
                    body: None,
                })
                .await
                .map_err(|e| tool_error(self.name(), e.to_string()))?;
            if response.status != 200 {
                return Err(tool_error(
                    self.name(),
                    format!("Jira plugin returned status {} for {key}", response.status),
                ));
            }
            let issue: Value = serde_json::from_str(&response.body)
                .map_err(|e| tool_error(self.name(), format!("unreadable issue {key}: {e}")))?;
            sections.push(format_issue(key, &issue));
        }
        Ok(sections.join("\n\n"))
    }
}
