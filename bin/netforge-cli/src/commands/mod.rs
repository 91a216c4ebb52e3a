// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations.

pub mod inspect;
pub mod plan;
pub mod run;
pub mod verify;

use anyhow::Context;
use model_ir::{build, load_descriptions, Network, Verified};
use runtime::RuntimeConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber; `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Loads, builds and verifies a description file.
pub fn load_network(path: &Path) -> anyhow::Result<Network<Verified>> {
    let descs = load_descriptions(path)
        .with_context(|| format!("failed to load description '{}'", path.display()))?;
    let network = build(&descs)
        .verify()
        .with_context(|| format!("'{}' does not build", path.display()))?;
    tracing::info!("{}", network.summary());
    Ok(network)
}
