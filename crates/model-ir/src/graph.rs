// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The built network: nodes with resolved sizes, edges, and the failures
//! collected while building.
//!
//! # Type-State Pattern
//!
//! ```text
//! Network<Built>    : compiled, may carry verification failures.
//!       │  .verify()
//!       ▼
//! Network<Verified> : no failures, ready for traversal planning.
//! ```
//!
//! Planning and execution only accept `Network<Verified>`, so a broken
//! graph can never reach them. The marker types are zero-sized.

use crate::metadata::{metadata, LayerMetadata, ParamDesc};
use crate::{Dims, LayerDesc, LayerKind, LayerType, ModelError, NetworkValues};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use tensor_core::{ConvGeometry, Shape};

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: network has been compiled but not checked for failures.
#[derive(Debug, Clone)]
pub struct Built;

/// Marker: network has no verification failures.
#[derive(Debug, Clone)]
pub struct Verified;

/// Sealed trait for network states.
pub trait NetworkState: fmt::Debug + Clone {}
impl NetworkState for Built {}
impl NetworkState for Verified {}

// ── Verification failures ──────────────────────────────────────────

/// Category of a build-time problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    EmptyDescription,
    DuplicateId,
    UnknownParent,
    /// A non-input node has no parent, leaving it disconnected.
    MissingInput,
    InputHasParent,
    MultipleParents,
    InvalidAttribute,
    UnresolvableSize,
    ShapeMismatch,
}

/// A structural or shape problem found while building. Collected, never
/// raised.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VerificationFailure {
    /// Offending node, when the problem is attributable to one.
    pub node: Option<String>,
    pub kind: FailureKind,
    pub detail: String,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "[{:?}] '{}': {}", self.kind, node, self.detail),
            None => write!(f, "[{:?}] {}", self.kind, self.detail),
        }
    }
}

// ── Node ───────────────────────────────────────────────────────────

/// A shape-resolved layer in the built network.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Node {
    pub id: String,
    /// The originating description, with `id` and `parents` filled in.
    pub desc: LayerDesc,
    pub input_dims: Dims,
    pub output_dims: Dims,
}

impl Node {
    pub fn kind(&self) -> &LayerKind {
        &self.desc.kind
    }

    pub fn layer_type(&self) -> LayerType {
        self.desc.layer_type()
    }

    pub fn metadata(&self) -> &'static LayerMetadata {
        metadata(self.layer_type())
    }

    pub fn parents(&self) -> &[String] {
        self.desc.parents.as_deref().unwrap_or_default()
    }

    /// The single parent of a non-input node.
    pub fn parent(&self) -> Option<&str> {
        self.parents().first().map(String::as_str)
    }

    pub fn input_size(&self) -> usize {
        self.input_dims.size()
    }

    pub fn output_size(&self) -> usize {
        self.output_dims.size()
    }

    /// Parameter descriptions paired with their resolved shapes.
    pub fn param_shapes(&self) -> impl Iterator<Item = (&'static ParamDesc, Shape)> + '_ {
        self.metadata()
            .params
            .iter()
            .map(|p| (p, (p.shape)(self.kind(), self.input_dims, self.output_dims)))
    }

    /// Number of trainable scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.param_shapes()
            .filter(|(p, _)| p.trainable)
            .map(|(_, s)| s.num_elements())
            .sum()
    }

    /// Window geometry for convolution and pooling nodes.
    pub fn conv_geometry(&self) -> Option<ConvGeometry> {
        let (kernel_width, kernel_height, pad_x, pad_y, stride_x, stride_y) = match *self.kind() {
            LayerKind::Convolutional {
                kernel_width,
                kernel_height,
                pad_x,
                pad_y,
                stride_x,
                stride_y,
                ..
            }
            | LayerKind::MaxPooling {
                kernel_width,
                kernel_height,
                pad_x,
                pad_y,
                stride_x,
                stride_y,
            } => (kernel_width, kernel_height, pad_x, pad_y, stride_x, stride_y),
            _ => return None,
        };
        Some(ConvGeometry {
            in_channels: self.input_dims.channels,
            in_height: self.input_dims.height,
            in_width: self.input_dims.width,
            out_channels: self.output_dims.channels,
            out_height: self.output_dims.height,
            out_width: self.output_dims.width,
            kernel_width,
            kernel_height,
            pad_x,
            pad_y,
            stride_x,
            stride_y,
        })
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let params = self.parameter_count();
        let mut s = format!(
            "{} ({}) {} -> {}",
            self.id, self.layer_type(), self.input_dims, self.output_dims
        );
        if params > 0 {
            s.push_str(&format!(", {params} params"));
        }
        s
    }
}

// ── Network ────────────────────────────────────────────────────────

/// The compiled graph. Nodes are stored in description order, which is a
/// topological order.
#[derive(Debug, Clone)]
pub struct Network<S: NetworkState = Built> {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    edges: Vec<(String, String)>,
    failures: Vec<VerificationFailure>,
    /// Durable parameter and result storage.
    pub values: NetworkValues,
    _state: PhantomData<S>,
}

impl Network<Built> {
    pub(crate) fn from_parts(
        nodes: Vec<Node>,
        edges: Vec<(String, String)>,
        failures: Vec<VerificationFailure>,
        values: NetworkValues,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        Self {
            nodes,
            index,
            edges,
            failures,
            values,
            _state: PhantomData,
        }
    }

    pub fn failures(&self) -> &[VerificationFailure] {
        &self.failures
    }

    /// `true` when the build found nothing wrong.
    pub fn is_usable(&self) -> bool {
        self.failures.is_empty()
    }

    /// Transitions to `Verified`, or returns every collected failure.
    pub fn verify(self) -> Result<Network<Verified>, ModelError> {
        if !self.failures.is_empty() {
            return Err(ModelError::VerificationFailed(self.failures));
        }
        Ok(Network {
            nodes: self.nodes,
            index: self.index,
            edges: self.edges,
            failures: Vec::new(),
            values: self.values,
            _state: PhantomData,
        })
    }
}

impl Network<Verified> {
    /// Re-emits descriptions with explicit ids, parents and the current
    /// parameter values, so the network can be persisted and rebuilt.
    pub fn to_descriptions(&self) -> Vec<LayerDesc> {
        self.nodes
            .iter()
            .map(|node| {
                let mut desc = node.desc.clone();
                if let Some(params) = self.values.parameters.get(&node.id) {
                    for (key, tensor) in params {
                        desc.parameters.insert(key.clone(), tensor.as_slice().to_vec());
                    }
                }
                desc
            })
            .collect()
    }
}

impl<S: NetworkState> Network<S> {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Looks up a node, failing with [`ModelError::UnknownNode`].
    pub fn require_node(&self, id: &str) -> Result<&Node, ModelError> {
        self.node(id)
            .ok_or_else(|| ModelError::UnknownNode(id.to_string()))
    }

    /// Nodes in topological order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Directed `(parent, child)` pairs.
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Ids of the nodes consuming `id`'s output, in topological order.
    pub fn children(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(from, _)| from == id)
            .map(|(_, to)| to.as_str())
            .collect()
    }

    /// Nodes without incoming edges, in topological order.
    pub fn roots(&self) -> Vec<&str> {
        let targets: HashSet<&str> = self.edges.iter().map(|(_, to)| to.as_str()).collect();
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !targets.contains(id))
            .collect()
    }

    /// Nodes without outgoing edges, in topological order.
    pub fn leaves(&self) -> Vec<&str> {
        let sources: HashSet<&str> = self.edges.iter().map(|(from, _)| from.as_str()).collect();
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !sources.contains(id))
            .collect()
    }

    /// Total number of trainable scalar parameters.
    pub fn parameter_count(&self) -> usize {
        self.nodes.iter().map(Node::parameter_count).sum()
    }

    /// Returns a summary string describing the network.
    pub fn summary(&self) -> String {
        format!(
            "Network: {} nodes, {} edges, {} trainable parameters, {} roots, {} leaves",
            self.nodes.len(),
            self.edges.len(),
            self.parameter_count(),
            self.roots().len(),
            self.leaves().len(),
        )
    }
}

impl<S: NetworkState> fmt::Display for Network<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        for failure in &self.failures {
            writeln!(f, "  ! {failure}")?;
        }
        Ok(())
    }
}

/// Partitions the ids appearing in `edges` into roots (zero in-degree) and
/// leaves (zero out-degree), each in order of first appearance.
///
/// Only ids that occur in at least one edge are considered; isolated nodes
/// have to be handled by the caller.
pub fn edges_to_roots_and_leaves<'a, I>(edges: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut has_in: HashSet<&str> = HashSet::new();
    let mut has_out: HashSet<&str> = HashSet::new();
    for (from, to) in edges {
        for id in [from.as_str(), to.as_str()] {
            if seen.insert(id) {
                order.push(id);
            }
        }
        has_out.insert(from.as_str());
        has_in.insert(to.as_str());
    }
    let roots = order
        .iter()
        .filter(|id| !has_in.contains(*id))
        .map(|id| id.to_string())
        .collect();
    let leaves = order
        .iter()
        .filter(|id| !has_out.contains(*id))
        .map(|id| id.to_string())
        .collect();
    (roots, leaves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_roots_and_leaves_chain() {
        let edges = vec![e("in", "fc"), e("fc", "sm")];
        let (roots, leaves) = edges_to_roots_and_leaves(&edges);
        assert_eq!(roots, ["in"]);
        assert_eq!(leaves, ["sm"]);
    }

    #[test]
    fn test_roots_and_leaves_branching() {
        let edges = vec![e("in", "a"), e("in", "b"), e("a", "c"), e("x", "c")];
        let (roots, leaves) = edges_to_roots_and_leaves(&edges);
        assert_eq!(roots, ["in", "x"]);
        assert_eq!(leaves, ["b", "c"]);
    }

    #[test]
    fn test_roots_and_leaves_empty() {
        let (roots, leaves) = edges_to_roots_and_leaves(&[]);
        assert!(roots.is_empty());
        assert!(leaves.is_empty());
    }

    #[test]
    fn test_failure_display() {
        let f = VerificationFailure {
            node: Some("fc".into()),
            kind: FailureKind::UnknownParent,
            detail: "parent 'nope' is not declared before this node".into(),
        };
        let s = f.to_string();
        assert!(s.contains("UnknownParent"));
        assert!(s.contains("'fc'"));
    }
}
