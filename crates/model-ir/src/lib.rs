// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! Layer descriptions, the per-type layer registry, and the network builder.
//!
//! - [`LayerDesc`] / [`LayerKind`]: declarative, serialisable layer records.
//! - [`registry`]: validating constructors, including fixed expansions
//!   such as `linear_softmax`.
//! - [`metadata`]: per-type parameter shapes and pass-sets, with a default
//!   row for types that need no entry of their own.
//! - [`build`]: compiles descriptions into a [`Network`], collecting
//!   verification failures instead of failing fast.
//! - [`Network`]: the built graph with a **type-state pattern**
//!   (`Built` → `Verified`).
//!
//! # Example
//! ```
//! use model_ir::{build, registry::*};
//!
//! let descs = sequence([input(28, 28, 1), linear_relu(100), linear_softmax(10)]).unwrap();
//! let network = build(&descs).verify().unwrap();
//! println!("{}", network.summary());
//! for node in network.iter_nodes() {
//!     println!("  {}", node.summary());
//! }
//! ```

mod builder;
mod dims;
mod error;
pub mod graph;
mod layer;
mod loader;
pub mod metadata;
pub mod registry;
mod values;

pub use builder::build;
pub use dims::Dims;
pub use error::ModelError;
pub use graph::{
    edges_to_roots_and_leaves, Built, FailureKind, Network, Node, VerificationFailure, Verified,
};
pub use layer::{LayerDesc, LayerKind, LayerType, MIN_BATCH_NORM_EPSILON};
pub use loader::{descriptions_from_json, descriptions_to_json, load_descriptions, save_descriptions};
pub use metadata::{metadata, BufferKind, LayerMetadata, ParamDesc, PassSet, PassType};
pub use values::NetworkValues;
