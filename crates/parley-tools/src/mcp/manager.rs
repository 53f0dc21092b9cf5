// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user MCP client pool with idle eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::McpConfig;
use parley_core::{LlmContext, ParleyError};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{McpClient, McpConnector, McpToolInfo};
use crate::tool::Tool;

/// How often idle clients are looked for.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct UserClients {
    clients: Vec<(String, Arc<dyn McpClient>)>,
    last_activity: Instant,
}

/// Owns every user's MCP sessions.
pub struct McpManager {
    config: McpConfig,
    connector: Arc<dyn McpConnector>,
    users: Mutex<HashMap<String, UserClients>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for McpManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpManager")
            .field("enabled", &self.config.enabled)
            .field("users", &self.user_count())
            .finish_non_exhaustive()
    }
}

impl McpManager {
    pub fn new(config: McpConfig, connector: Arc<dyn McpConnector>) -> Arc<Self> {
        Arc::new(Self {
            config,
            connector,
            users: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.idle_timeout_minutes.saturating_mul(60))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UserClients>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn user_count(&self) -> usize {
        self.lock().len()
    }

    /// Starts the periodic idle sweep. It stops when [`close`](Self::close) is called.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + SWEEP_INTERVAL, SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = manager.shutdown.cancelled() => break,
                    _ = ticker.tick() => manager.sweep_idle().await,
                }
            }
            debug!("mcp sweeper stopped");
        })
    }

    /// Closes clients of users idle longer than the configured timeout.
    pub async fn sweep_idle(&self) {
        let timeout = self.idle_timeout();
        let now = Instant::now();
        let expired: Vec<(String, UserClients)> = {
            let mut users = self.lock();
            let idle: Vec<String> = users
                .iter()
                .filter(|(_, u)| now.duration_since(u.last_activity) > timeout)
                .map(|(id, _)| id.clone())
                .collect();
            idle.into_iter()
                .filter_map(|id| users.remove(&id).map(|u| (id, u)))
                .collect()
        };
        for (user_id, entry) in expired {
            debug!(user_id = %user_id, "closing idle mcp clients");
            for (_, client) in entry.clients {
                client.close().await;
            }
        }
    }

    async fn clients_for(&self, user_id: &str) -> Vec<(String, Arc<dyn McpClient>)> {
        {
            let mut users = self.lock();
            if let Some(entry) = users.get_mut(user_id) {
                entry.last_activity = Instant::now();
                return entry.clients.clone();
            }
        }

        let mut clients = Vec::new();
        for server in &self.config.servers {
            match self.connector.connect(server, user_id).await {
                Ok(client) => clients.push((server.name.clone(), client)),
                Err(e) => warn!(server = %server.name, user_id, error = %e, "mcp connect failed"),
            }
        }

        let mut users = self.lock();
        let entry = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserClients {
                clients,
                last_activity: Instant::now(),
            });
        entry.last_activity = Instant::now();
        entry.clients.clone()
    }

    /// The MCP tools available to `user_id`, connecting on first use.
    ///
    /// Servers that fail to connect or list are skipped.
    pub async fn tools_for_user(&self, user_id: &str) -> Vec<Arc<dyn Tool>> {
        if !self.config.enabled || self.config.servers.is_empty() || self.shutdown.is_cancelled() {
            return Vec::new();
        }
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for (server, client) in self.clients_for(user_id).await {
            match client.list_tools().await {
                Ok(infos) => tools.extend(infos.into_iter().map(|info| {
                    Arc::new(McpTool {
                        server: server.clone(),
                        info,
                        client: client.clone(),
                    }) as Arc<dyn Tool>
                })),
                Err(e) => warn!(server = %server, error = %e, "mcp tool listing failed"),
            }
        }
        tools
    }

    /// Stops the sweeper and closes every client.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let all: Vec<UserClients> = self.lock().drain().map(|(_, u)| u).collect();
        let count = all.len();
        for entry in all {
            for (_, client) in entry.clients {
                client.close().await;
            }
        }
        info!(users = count, "mcp manager closed");
    }
}

/// An MCP server tool exposed through the tool store.
pub struct McpTool {
    server: String,
    info: McpToolInfo,
    client: Arc<dyn McpClient>,
}

impl McpTool {
    pub fn server(&self) -> &str {
        &self.server
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn parameters_schema(&self) -> Value {
        if self.info.input_schema.is_null() {
            serde_json::json!({"type": "object", "properties": {}})
        } else {
            self.info.input_schema.clone()
        }
    }

    async fn invoke(&self, arguments: &Value, _context: &LlmContext) -> Result<String, ParleyError> {
        self.client.call_tool(&self.info.name, arguments).await
    }
}
