// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # netforge
//!
//! Command-line interface for the network build/plan/execute pipeline.
//!
//! ## Usage
//! ```bash
//! # Build a description and print the network or its failures
//! netforge inspect --description ./lenet.json
//!
//! # Print the training traversal, keeping every buffer
//! netforge plan --description ./lenet.json --pass training --save-gradients
//!
//! # Run one inference on seeded random input
//! netforge run --description ./lenet.json --config ./runtime.toml
//!
//! # Compare against an imported reference model
//! netforge verify --import ./exported.json
//! ```

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "netforge",
    about = "Build, plan, run and verify neural-network descriptions",
    version,
    author
)]
struct Cli {
    /// Path to a TOML runtime configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Pass type selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Pass {
    Inference,
    Training,
}

impl From<Pass> for model_ir::PassType {
    fn from(pass: Pass) -> Self {
        match pass {
            Pass::Inference => Self::Inference,
            Pass::Training => Self::Training,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a description and print the network or its verification failures.
    Inspect {
        /// Path to the JSON layer description.
        #[arg(short, long)]
        description: PathBuf,
    },

    /// Print the traversal plan for a description.
    Plan {
        #[arg(short, long)]
        description: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Pass::Inference)]
        pass: Pass,

        /// Retain every buffer, gradients included, for the whole traversal.
        #[arg(long)]
        save_gradients: bool,

        /// Print the plan as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Run one inference traversal on seeded random input.
    Run {
        #[arg(short, long)]
        description: PathBuf,

        /// Override the configured batch size.
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Verify a built network against an imported reference model.
    Verify {
        /// Path to the JSON import (`model`, `input`, `layer-outputs`).
        #[arg(short, long)]
        import: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { description } => commands::inspect::execute(&description),
        Commands::Plan {
            description,
            pass,
            save_gradients,
            json,
        } => commands::plan::execute(&description, &config, pass.into(), save_gradients, json),
        Commands::Run {
            description,
            batch_size,
        } => commands::run::execute(&description, config, batch_size),
        Commands::Verify { import } => commands::verify::execute(&import, config),
    }
}
