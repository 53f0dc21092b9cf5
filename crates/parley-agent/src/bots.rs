// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciles configured bots with bot accounts on the host.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use parley_config::model::{BotConfig, ParleyConfig};
use parley_core::host::BotIdentity;
use parley_core::{HostPlatform, LanguageModel, ParleyError};
use parley_llm::ModelFactory;
use tracing::{info, warn};

/// Cluster mutex guarding reconciliation.
pub const ENSURE_BOTS_LOCK: &str = "ai_ensure_bots";

/// A configured bot bound to its host account and model.
pub struct Bot {
    pub config: BotConfig,
    /// Host user ID of the bot account.
    pub user_id: String,
    pub model: Arc<dyn LanguageModel>,
}

impl Bot {
    pub fn username(&self) -> &str {
        &self.config.name
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.config.name)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// The active bot set, in configuration order.
pub struct BotRegistry {
    host: Arc<dyn HostPlatform>,
    factory: Arc<dyn ModelFactory>,
    bots: RwLock<Vec<Arc<Bot>>>,
    default_bot: RwLock<String>,
}

impl std::fmt::Debug for BotRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRegistry")
            .field("bots", &self.all().len())
            .finish_non_exhaustive()
    }
}

impl BotRegistry {
    pub fn new(host: Arc<dyn HostPlatform>, factory: Arc<dyn ModelFactory>) -> Self {
        Self {
            host,
            factory,
            bots: RwLock::new(Vec::new()),
            default_bot: RwLock::new(String::new()),
        }
    }

    /// Creates or updates a host account per configured bot, deactivates
    /// accounts of removed bots, and swaps in the new set.
    ///
    /// Runs under the cluster mutex [`ENSURE_BOTS_LOCK`]. Without a
    /// multi-bot license only the first configured bot is kept.
    pub async fn ensure_bots(&self, config: &ParleyConfig) -> Result<(), ParleyError> {
        self.host.cluster_lock(ENSURE_BOTS_LOCK).await?;
        let result = self.reconcile(config).await;
        self.host.cluster_unlock(ENSURE_BOTS_LOCK).await;
        result
    }

    async fn reconcile(&self, config: &ParleyConfig) -> Result<(), ParleyError> {
        let mut wanted: Vec<&BotConfig> = config.bots.iter().collect();
        if wanted.len() > 1 && !self.host.is_multi_bot_licensed() {
            warn!(configured = wanted.len(), "multiple bots require a license; keeping the first");
            wanted.truncate(1);
        }

        let mut bots = Vec::with_capacity(wanted.len());
        for cfg in wanted {
            let user_id = self
                .host
                .ensure_bot(&BotIdentity {
                    username: cfg.name.clone(),
                    display_name: cfg.display_name.clone(),
                    description: format!("Powered by {}", cfg.service.service_type.as_str()),
                })
                .await?;
            let model = self.factory.chat_model(cfg)?;
            bots.push(Arc::new(Bot {
                config: cfg.clone(),
                user_id,
                model,
            }));
        }

        let active: HashSet<&str> = bots.iter().map(|b| b.user_id.as_str()).collect();
        for owned in self.host.list_owned_bots().await? {
            if !active.contains(owned.id.as_str()) && owned.delete_at == 0 {
                info!(bot = %owned.username, "deactivating removed bot");
                self.host.set_bot_active(&owned.id, false).await?;
            }
        }

        let default_name = match config.default_bot() {
            Some(bot) if bots.iter().any(|b| b.config.name == bot.name) => bot.name.clone(),
            _ => bots.first().map(|b| b.config.name.clone()).unwrap_or_default(),
        };
        info!(bots = bots.len(), default = %default_name, "bots reconciled");
        *self.bots.write().unwrap_or_else(|e| e.into_inner()) = bots;
        *self.default_bot.write().unwrap_or_else(|e| e.into_inner()) = default_name;
        Ok(())
    }

    pub fn all(&self) -> Vec<Arc<Bot>> {
        self.bots.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn by_username(&self, username: &str) -> Option<Arc<Bot>> {
        self.all().into_iter().find(|b| b.config.name == username)
    }

    pub fn by_user_id(&self, user_id: &str) -> Option<Arc<Bot>> {
        self.all().into_iter().find(|b| b.user_id == user_id)
    }

    pub fn default_bot(&self) -> Option<Arc<Bot>> {
        let name = self
            .default_bot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        self.by_username(&name).or_else(|| self.all().into_iter().next())
    }

    /// Host user IDs of every active bot.
    pub fn user_ids(&self) -> HashSet<String> {
        self.all().iter().map(|b| b.user_id.clone()).collect()
    }

    pub fn is_bot(&self, user_id: &str) -> bool {
        self.by_user_id(user_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_config::model::ServiceConfig;
    use parley_test_utils::{MockHost, MockModel, MockModelFactory};

    fn bot_config(name: &str) -> BotConfig {
        BotConfig {
            id: name.into(),
            name: name.into(),
            display_name: name.to_uppercase(),
            custom_instructions: String::new(),
            service: ServiceConfig::default(),
            enable_vision: false,
            disable_tools: false,
            channel_access_level: Default::default(),
            channel_ids: vec![],
            user_access_level: Default::default(),
            user_ids: vec![],
            team_ids: vec![],
            max_file_size: 1024,
        }
    }

    fn registry(host: &Arc<MockHost>) -> BotRegistry {
        BotRegistry::new(
            host.clone(),
            Arc::new(MockModelFactory::new(Arc::new(MockModel::new()))),
        )
    }

    fn config(names: &[&str], default_bot: &str) -> ParleyConfig {
        ParleyConfig {
            default_bot: default_bot.into(),
            bots: names.iter().map(|n| bot_config(n)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn creates_accounts_and_picks_default() {
        let host = Arc::new(MockHost::new());
        let registry = registry(&host);
        registry
            .ensure_bots(&config(&["copilot", "helper"], "helper"))
            .await
            .unwrap();

        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.default_bot().unwrap().username(), "helper");
        let copilot = registry.by_username("copilot").unwrap();
        assert!(registry.is_bot(&copilot.user_id));
        assert_eq!(host.owned_bot_ids().len(), 2);
    }

    #[tokio::test]
    async fn removed_bots_are_deactivated() {
        let host = Arc::new(MockHost::new());
        let registry = registry(&host);
        registry.ensure_bots(&config(&["copilot", "helper"], "")).await.unwrap();
        let helper_id = registry.by_username("helper").unwrap().user_id.clone();

        registry.ensure_bots(&config(&["copilot"], "")).await.unwrap();
        assert!(registry.by_username("helper").is_none());
        assert_eq!(host.user(&helper_id).unwrap().delete_at, 1);
        assert_eq!(registry.default_bot().unwrap().username(), "copilot");
    }

    #[tokio::test]
    async fn unlicensed_install_keeps_first_bot() {
        let host = Arc::new(MockHost::new());
        host.set_licensed(false);
        let registry = registry(&host);
        registry
            .ensure_bots(&config(&["copilot", "helper"], "helper"))
            .await
            .unwrap();
        assert_eq!(registry.all().len(), 1);
        assert_eq!(registry.default_bot().unwrap().username(), "copilot");
    }

    #[tokio::test]
    async fn lock_is_released_after_reconcile() {
        let host = Arc::new(MockHost::new());
        let registry = registry(&host);
        registry.ensure_bots(&config(&["copilot"], "")).await.unwrap();
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            host.cluster_lock(ENSURE_BOTS_LOCK),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
