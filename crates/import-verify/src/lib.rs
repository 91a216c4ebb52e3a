// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # import-verify
//!
//! Numerical verification of built networks against models imported from
//! other frameworks.
//!
//! An import supplies a layer description, an input and the reference output
//! of each layer. [`verify`] builds the description, runs one inference
//! traversal that keeps every intermediate buffer and reports a [`Mismatch`]
//! for each layer outside the tolerance (`1e-3`, absolute for values up to
//! one and relative above). Mismatches are data, not errors; only a broken
//! description or an unknown layer id fails the call.

mod adapter;
mod compare;
mod error;
mod verify;

pub use adapter::{ImportedModel, LayerOutput};
pub use compare::{outputs_agree, within_tolerance, Mismatch, TOLERANCE};
pub use error::VerifyError;
pub use verify::{verify, verify_import};
