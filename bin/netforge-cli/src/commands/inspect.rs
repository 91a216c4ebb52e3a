// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `netforge inspect`: build a description and show the result.

use anyhow::Context;
use model_ir::{build, load_descriptions};
use std::path::Path;

pub fn execute(description: &Path) -> anyhow::Result<()> {
    let descs = load_descriptions(description)
        .with_context(|| format!("failed to load description '{}'", description.display()))?;
    let network = build(&descs);

    println!("  Description: {} ({} layers)", description.display(), descs.len());
    println!();
    print!("{network}");
    println!();

    if !network.is_usable() {
        anyhow::bail!(
            "network has {} verification failure(s)",
            network.failures().len()
        );
    }
    println!("  Roots:  {}", network.roots().join(", "));
    println!("  Leaves: {}", network.leaves().join(", "));
    Ok(())
}
