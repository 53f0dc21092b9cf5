// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live configuration with change listeners.
//!
//! Readers take a cheap snapshot; an update validates the candidate, swaps it
//! in atomically, then runs every listener synchronously on the caller's task.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;
use crate::validation::validate_config;

type Listener = Box<dyn Fn(&Arc<ParleyConfig>) + Send + Sync>;

/// Holds the active configuration.
pub struct ConfigStore {
    current: ArcSwap<ParleyConfig>,
    listeners: Mutex<Vec<Listener>>,
}

impl ConfigStore {
    pub fn new(config: ParleyConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The configuration in effect right now.
    pub fn snapshot(&self) -> Arc<ParleyConfig> {
        self.current.load_full()
    }

    /// Registers a callback run after every successful update.
    pub fn register_listener<F>(&self, listener: F)
    where
        F: Fn(&Arc<ParleyConfig>) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    /// Validates and installs `config`. On failure the active config is kept.
    pub fn update(&self, config: ParleyConfig) -> Result<(), Vec<ConfigError>> {
        validate_config(&config)?;
        let config = Arc::new(config);
        self.current.store(Arc::clone(&config));
        tracing::info!(bots = config.bots.len(), "configuration updated");

        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(&config);
        }
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(ParleyConfig::default())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("current", &self.current.load())
            .finish_non_exhaustive()
    }
}
