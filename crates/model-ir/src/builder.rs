// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compiles a description list into a [`Network`].
//!
//! The walk threads size inference forward through the descriptions and
//! collects every structural or shape problem into the network's failure
//! list instead of stopping at the first one. A node whose parent could not
//! be resolved is skipped silently, so a single root cause is reported once.

use crate::graph::{Built, FailureKind, Node, VerificationFailure};
use crate::{Dims, LayerDesc, LayerType, Network, NetworkValues};
use std::collections::{HashMap, HashSet};
use tensor_core::Tensor;

fn failure(id: &str, kind: FailureKind, detail: String) -> VerificationFailure {
    VerificationFailure {
        node: Some(id.to_string()),
        kind,
        detail,
    }
}

/// Builds a network from `descriptions`.
///
/// - Node ids are explicit or auto-assigned `<type>-<n>` (1-based per type).
/// - Parents are explicit or default to the preceding description; input
///   layers take no parent. Parents must be declared earlier, so the
///   description order is always a valid topological order.
/// - Explicit parameter values are moved into the network's durable values.
pub fn build(descriptions: &[LayerDesc]) -> Network<Built> {
    let mut failures = Vec::new();
    if descriptions.is_empty() {
        failures.push(VerificationFailure {
            node: None,
            kind: FailureKind::EmptyDescription,
            detail: "description list is empty".into(),
        });
        return Network::from_parts(Vec::new(), Vec::new(), failures, NetworkValues::default());
    }

    let mut counters: HashMap<LayerType, usize> = HashMap::new();
    let mut declared: HashSet<String> = HashSet::new();
    // Output dimensions of nodes whose sizes are known.
    let mut resolved: HashMap<String, Dims> = HashMap::new();
    let mut nodes = Vec::with_capacity(descriptions.len());
    let mut edges = Vec::new();
    let mut values = NetworkValues::default();
    let mut previous: Option<String> = None;

    for desc in descriptions {
        let layer_type = desc.layer_type();
        let counter = counters.entry(layer_type).or_insert(0);
        *counter += 1;
        let id = desc
            .id
            .clone()
            .unwrap_or_else(|| format!("{layer_type}-{counter}"));

        if !declared.insert(id.clone()) {
            failures.push(failure(
                &id,
                FailureKind::DuplicateId,
                format!("id '{id}' is already used by an earlier node"),
            ));
            continue;
        }

        let parents: Vec<String> = match (&desc.parents, layer_type) {
            (Some(explicit), _) => explicit.clone(),
            (None, LayerType::Input) => Vec::new(),
            (None, _) => previous.iter().cloned().collect(),
        };
        previous = Some(id.clone());

        let mut usable = true;
        if let Err(detail) = desc.kind.validate() {
            failures.push(failure(&id, FailureKind::InvalidAttribute, detail));
            usable = false;
        }

        // `None` means the input dimensions are unknown: either a failure was
        // just recorded or the parent itself failed.
        let input_dims: Option<Dims> = if layer_type == LayerType::Input {
            if !parents.is_empty() {
                failures.push(failure(
                    &id,
                    FailureKind::InputHasParent,
                    format!("input layer declares parents {parents:?}"),
                ));
                usable = false;
            }
            Some(Dims::default())
        } else {
            match parents.as_slice() {
                [] => {
                    failures.push(failure(
                        &id,
                        FailureKind::MissingInput,
                        "node has no parent and is not an input layer".into(),
                    ));
                    usable = false;
                    None
                }
                [parent] if parent == &id || !declared.contains(parent) => {
                    failures.push(failure(
                        &id,
                        FailureKind::UnknownParent,
                        format!("parent '{parent}' is not declared before this node"),
                    ));
                    usable = false;
                    None
                }
                [parent] => resolved.get(parent).copied(),
                many => {
                    failures.push(failure(
                        &id,
                        FailureKind::MultipleParents,
                        format!(
                            "{layer_type} layers take a single input, got {} parents",
                            many.len()
                        ),
                    ));
                    usable = false;
                    None
                }
            }
        };

        let Some(input_dims) = input_dims.filter(|_| usable) else {
            continue;
        };

        let output_dims = match desc.kind.output_dims(input_dims) {
            Ok(dims) => dims,
            Err(detail) => {
                failures.push(failure(&id, FailureKind::UnresolvableSize, detail));
                continue;
            }
        };
        let input_dims = if layer_type == LayerType::Input {
            output_dims
        } else {
            input_dims
        };

        if let Some(expected) = desc.input_size {
            if expected != input_dims.size() {
                failures.push(failure(
                    &id,
                    FailureKind::ShapeMismatch,
                    format!(
                        "declares input-size {expected} but receives {} ({input_dims})",
                        input_dims.size()
                    ),
                ));
            }
        }
        if let Some(declared) = desc.output_size {
            if declared != output_dims.size() {
                failures.push(failure(
                    &id,
                    FailureKind::ShapeMismatch,
                    format!(
                        "declares output-size {declared} but produces {} ({output_dims})",
                        output_dims.size()
                    ),
                ));
            }
        }

        let mut resolved_desc = desc.clone();
        resolved_desc.id = Some(id.clone());
        resolved_desc.parents = Some(parents.clone());
        resolved_desc.parameters.clear();
        let node = Node {
            id: id.clone(),
            desc: resolved_desc,
            input_dims,
            output_dims,
        };

        for (key, data) in &desc.parameters {
            let Some(param) = node.metadata().param(key) else {
                failures.push(failure(
                    &id,
                    FailureKind::InvalidAttribute,
                    format!("{layer_type} layers have no parameter '{key}'"),
                ));
                continue;
            };
            let shape = (param.shape)(node.kind(), input_dims, output_dims);
            match Tensor::from_vec(shape, data.clone()) {
                Ok(tensor) => values.set_parameter(&id, key, tensor),
                Err(e) => failures.push(failure(
                    &id,
                    FailureKind::ShapeMismatch,
                    format!("parameter '{key}': {e}"),
                )),
            }
        }

        for parent in &parents {
            edges.push((parent.clone(), id.clone()));
        }
        resolved.insert(id, output_dims);
        nodes.push(node);
    }

    if failures.is_empty() {
        tracing::info!("built network: {} nodes, {} edges", nodes.len(), edges.len());
    } else {
        tracing::warn!(
            "built network with {} verification failure(s) across {} descriptions",
            failures.len(),
            descriptions.len(),
        );
    }
    Network::from_parts(nodes, edges, failures, values)
}
