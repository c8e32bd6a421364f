//! Window Configuration
//!
//! Construction-time settings for a [`Window`](crate::window::Window).
//! Exposure of the debugging globals used to be process-wide state; here it
//! is plain configuration handed to each window when it is built.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a window and the event loop it drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowConfig {
    /// Expose the `inspector` global on the window.
    pub expose_inspector: bool,
    /// Expose the `internals` global on the window.
    pub expose_internals: bool,
    /// Length of an idle period when the embedder supplies no explicit deadline.
    /// Read by [`EventLoop::with_config`](crate::EventLoop::with_config) only.
    pub max_idle_period_ms: f64,
    /// How long a user activation keeps the window transiently activated.
    pub transient_activation_duration_ms: f64,
    /// Maximum nesting depth accepted by the structured clone codec.
    pub clone_max_depth: usize,
    /// Maximum tasks executed by a single `run_until_idle` drain.
    /// Read by [`EventLoop::with_config`](crate::EventLoop::with_config) only.
    pub max_tasks_per_drain: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            expose_inspector: false,
            expose_internals: false,
            max_idle_period_ms: 50.0,
            transient_activation_duration_ms: 5000.0,
            clone_max_depth: 1000,
            max_tasks_per_drain: 10_000,
        }
    }
}

impl WindowConfig {
    /// Load a configuration from a JSON string. Missing fields take their defaults.
    pub fn load(json: &str) -> Result<Self> {
        let config: WindowConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse window config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::load(&json)
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_idle_period_ms.is_finite() && self.max_idle_period_ms >= 0.0) {
            return Err(Error::Config(format!(
                "maxIdlePeriodMs must be a non-negative number, got {}",
                self.max_idle_period_ms
            )));
        }
        if !(self.transient_activation_duration_ms.is_finite()
            && self.transient_activation_duration_ms >= 0.0)
        {
            return Err(Error::Config(format!(
                "transientActivationDurationMs must be a non-negative number, got {}",
                self.transient_activation_duration_ms
            )));
        }
        if self.clone_max_depth == 0 {
            return Err(Error::Config("cloneMaxDepth must be at least 1".to_string()));
        }
        Ok(())
    }
}
