// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GitHub issue lookup, proxied through the GitHub plugin.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parley_core::host::PluginRequest;
use parley_core::{HostPlatform, LlmContext, ParleyError};
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tool::{Tool, parse_args, schema_for, tool_error};

pub const GITHUB_PLUGIN_ID: &str = "github";

const MAX_OWNER_CHARS: usize = 39;
const MAX_REPO_CHARS: usize = 100;

static REPO_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+$").expect("repository pattern is valid")
});

#[derive(Debug, Deserialize, JsonSchema)]
struct GithubIssueArgs {
    /// The owner of the repository, e.g. "mattermost".
    repo_owner: String,
    /// The name of the repository, e.g. "server".
    repo_name: String,
    /// The issue number.
    number: i64,
}

#[derive(Debug, Deserialize)]
struct GithubIssue {
    #[serde(default)]
    title: String,
    #[serde(default)]
    number: i64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    user: Option<GithubUser>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

pub struct GetGithubIssue {
    host: Arc<dyn HostPlatform>,
}

impl GetGithubIssue {
    pub fn new(host: Arc<dyn HostPlatform>) -> Self {
        Self { host }
    }

    fn validate(&self, args: &GithubIssueArgs) -> Result<(), ParleyError> {
        let owner_ok = args.repo_owner.len() <= MAX_OWNER_CHARS && REPO_PART.is_match(&args.repo_owner);
        let repo_ok = args.repo_name.len() <= MAX_REPO_CHARS && REPO_PART.is_match(&args.repo_name);
        if !owner_ok {
            return Err(tool_error(self.name(), "invalid repository owner"));
        }
        if !repo_ok {
            return Err(tool_error(self.name(), "invalid repository name"));
        }
        if args.number < 1 {
            return Err(tool_error(self.name(), "issue number must be positive"));
        }
        Ok(())
    }
}

fn format_issue(issue: &GithubIssue) -> String {
    let submitter = issue.user.as_ref().map(|u| u.login.as_str()).unwrap_or("unknown");
    format!(
        "Title: {}\nNumber: {}\nState: {}\nSubmitter: {}\nURL: {}\nBody: {}",
        issue.title,
        issue.number,
        issue.state,
        submitter,
        issue.html_url,
        issue.body.as_deref().unwrap_or("")
    )
}

#[async_trait]
impl Tool for GetGithubIssue {
    fn name(&self) -> &str {
        "GetGithubIssue"
    }

    fn description(&self) -> &str {
        "Retrieve a single GitHub issue by owner, repository, and issue number."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<GithubIssueArgs>()
    }

    async fn invoke(&self, arguments: &Value, context: &LlmContext) -> Result<String, ParleyError> {
        let args: GithubIssueArgs = parse_args(self.name(), arguments)?;
        self.validate(&args)?;
        let user_id = context
            .requesting_user_id()
            .ok_or_else(|| tool_error(self.name(), "no requesting user"))?;

        let response = self
            .host
            .plugin_request(PluginRequest {
                plugin_id: GITHUB_PLUGIN_ID.to_string(),
                method: "GET".to_string(),
                path: format!(
                    "/api/v1/issue?owner={}&repo={}&number={}",
                    args.repo_owner, args.repo_name, args.number
                ),
                user_id: user_id.to_string(),
                body: None,
            })
            .await
            .map_err(|e| tool_error(self.name(), e.to_string()))?;
        if response.status != 200 {
            return Err(tool_error(
                self.name(),
                format!("GitHub plugin returned status {}", response.status),
            ));
        }
        let issue: GithubIssue = serde_json::from_str(&response.body)
            .map_err(|e| tool_error(self.name(), format!("unreadable issue: {e}")))?;
        Ok(format_issue(&issue))
    }
}
