// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! memory_budget = "512M"
//! buffer_strategy = "lifetime-reuse"
//! batch_size = 32
//! seed = 42
//! enable_profiling = true
//! ```

use crate::RuntimeError;
use memory_manager::MemoryBudget;
use std::path::Path;
use traversal_planner::{strategy, BufferStrategy};

/// Configuration for the execution runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Memory budget for all scoped buffers (human-readable, e.g., `"512M"`).
    pub memory_budget: String,
    /// Buffer strategy name: `"dedicated"` or `"lifetime-reuse"`.
    #[serde(default = "default_strategy")]
    pub buffer_strategy: String,
    /// Samples per traversal.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Seeds parameter initialization and dropout masks.
    #[serde(default)]
    pub seed: u64,
    /// Whether to record per-step timings.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
}

fn default_strategy() -> String {
    "lifetime-reuse".to_string()
}

fn default_batch_size() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str).map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Parses the memory budget string into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, RuntimeError> {
        MemoryBudget::parse(&self.memory_budget)
            .map_err(|e| RuntimeError::Config(format!("invalid budget: {e}")))
    }

    /// Creates the buffer strategy specified by this config.
    pub fn create_strategy(&self) -> Result<Box<dyn BufferStrategy>, RuntimeError> {
        strategy::by_name(&self.buffer_strategy.to_lowercase()).ok_or_else(|| {
            RuntimeError::Config(format!(
                "unknown buffer strategy '{}'; expected 'dedicated' or 'lifetime-reuse'",
                self.buffer_strategy
            ))
        })
    }

    /// Checks every field without building anything.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.parse_budget()?;
        self.create_strategy()?;
        if self.batch_size == 0 {
            return Err(RuntimeError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_budget: "512M".to_string(),
            buffer_strategy: default_strategy(),
            batch_size: 1,
            seed: 42,
            enable_profiling: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert_eq!(c.memory_budget, "512M");
        assert_eq!(c.buffer_strategy, "lifetime-reuse");
        assert_eq!(c.batch_size, 1);
        assert!(c.enable_profiling);
        c.validate().unwrap();
    }

    #[test]
    fn test_parse_budget() {
        let c = RuntimeConfig {
            memory_budget: "256M".into(),
            ..Default::default()
        };
        assert_eq!(c.parse_budget().unwrap().as_mb(), 256);

        let bad = RuntimeConfig {
            memory_budget: "lots".into(),
            ..Default::default()
        };
        assert!(matches!(bad.parse_budget(), Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
memory_budget = "1G"
buffer_strategy = "dedicated"
batch_size = 16
seed = 7
enable_profiling = false
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.memory_budget, "1G");
        assert_eq!(c.buffer_strategy, "dedicated");
        assert_eq!(c.batch_size, 16);
        assert_eq!(c.seed, 7);
        assert!(!c.enable_profiling);
    }

    #[test]
    fn test_from_toml_defaults() {
        let c = RuntimeConfig::from_toml("memory_budget = \"64M\"").unwrap();
        assert_eq!(c.buffer_strategy, "lifetime-reuse");
        assert_eq!(c.batch_size, 1);
        assert_eq!(c.seed, 0);
        assert!(c.enable_profiling);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig::default();
        let back = RuntimeConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_create_strategy() {
        let c = RuntimeConfig {
            buffer_strategy: "Dedicated".into(),
            ..Default::default()
        };
        assert_eq!(c.create_strategy().unwrap().name(), "dedicated");
        assert_eq!(
            RuntimeConfig::default().create_strategy().unwrap().name(),
            "lifetime-reuse"
        );
    }

    #[test]
    fn test_create_strategy_unknown() {
        let c = RuntimeConfig {
            buffer_strategy: "bogus".into(),
            ..Default::default()
        };
        assert!(c.create_strategy().is_err());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let c = RuntimeConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(RuntimeError::Config(_))));
    }
}
