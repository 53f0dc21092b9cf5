// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools shipped with Parley.

pub mod github;
pub mod jira;
pub mod lookup_user;
pub mod search;

pub use github::GetGithubIssue;
pub use jira::GetJiraIssue;
pub use lookup_user::LookupUser;
pub use search::SearchServer;

use std::sync::Arc;

use parley_core::HostPlatform;
use parley_prompts::Prompts;
use parley_search::EmbeddingSearch;

use crate::tool::ToolStore;

pub const SEARCH_TOOL_NAME: &str = "SearchServer";

/// Shared dependencies of the built-in tools.
#[derive(Clone)]
pub struct BuiltinTools {
    host: Arc<dyn HostPlatform>,
    prompts: Arc<Prompts>,
    search: Option<Arc<EmbeddingSearch>>,
}

impl std::fmt::Debug for BuiltinTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinTools")
            .field("search", &self.search.is_some())
            .finish_non_exhaustive()
    }
}

impl BuiltinTools {
    pub fn new(
        host: Arc<dyn HostPlatform>,
        prompts: Arc<Prompts>,
        search: Option<Arc<EmbeddingSearch>>,
    ) -> Self {
        Self {
            host,
            prompts,
            search,
        }
    }

    /// A store with every built-in tool.
    ///
    /// Server search is added only when `include_search` is set and an
    /// embedding search backend is configured.
    pub fn store(&self, include_search: bool) -> ToolStore {
        let mut store = ToolStore::new();
        store.register(Arc::new(LookupUser::new(self.host.clone())));
        store.register(Arc::new(GetGithubIssue::new(self.host.clone())));
        store.register(Arc::new(GetJiraIssue::new(self.host.clone())));
        if include_search && let Some(search) = &self.search {
            store.register(Arc::new(SearchServer::new(
                search.clone(),
                self.host.clone(),
                self.prompts.clone(),
            )));
        }
        store
    }
}
