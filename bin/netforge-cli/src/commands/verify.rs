// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `netforge verify`: compare a network against an imported reference.

use anyhow::Context;
use import_verify::{verify_import, ImportedModel};
use runtime::{ExecutionContext, RuntimeConfig};
use std::path::Path;

pub fn execute(import: &Path, config: RuntimeConfig) -> anyhow::Result<()> {
    let model = ImportedModel::from_file(import)
        .with_context(|| format!("failed to load import '{}'", import.display()))?;
    let ctx = ExecutionContext::new(config)?;

    let mismatches = verify_import(&ctx, &model)?;
    println!(
        "  Compared {} layer output(s) from '{}'",
        model.layer_outputs.len(),
        import.display()
    );
    if mismatches.is_empty() {
        println!("  All layers agree within tolerance.");
        return Ok(());
    }
    for m in &mismatches {
        println!("   ✗ {m}");
    }
    anyhow::bail!("{} layer(s) diverge from the reference", mismatches.len())
}
