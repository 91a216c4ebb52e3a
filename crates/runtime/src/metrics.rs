// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Traversal profiling metrics.
//!
//! [`TraversalMetrics`] collects per-step and aggregate timing plus the
//! scope's memory high-water mark. Step timings are only recorded when
//! profiling is enabled in [`crate::RuntimeConfig`].

use std::time::Duration;
use traversal_planner::StepKind;

/// Metrics for a single executed step.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StepMetrics {
    pub node: String,
    pub kind: StepKind,
    pub duration: Duration,
}

/// Aggregate metrics for one traversal.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TraversalMetrics {
    /// Total wall-clock time of the traversal.
    pub total_duration: Duration,
    /// Time spent in forward steps.
    pub forward_duration: Duration,
    /// Time spent in loss, backward and parameter-gradient steps.
    pub backward_duration: Duration,
    /// Peak bytes held by the execution scope.
    pub peak_memory_bytes: usize,
    /// Per-step metrics, in execution order.
    pub step_metrics: Vec<StepMetrics>,
    pub batch_size: usize,
}

impl TraversalMetrics {
    /// Creates an empty metrics container.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Default::default()
        }
    }

    /// Records metrics for a single step.
    pub fn record_step(&mut self, node: &str, kind: StepKind, duration: Duration) {
        match kind {
            StepKind::Forward => self.forward_duration += duration,
            _ => self.backward_duration += duration,
        }
        self.step_metrics.push(StepMetrics {
            node: node.to_string(),
            kind,
            duration,
        });
    }

    /// Finalises metrics with the total wall-clock time and peak memory.
    pub fn finalise(&mut self, total: Duration, peak_memory_bytes: usize) {
        self.total_duration = total;
        self.peak_memory_bytes = peak_memory_bytes;
    }

    /// Returns samples-per-second throughput.
    pub fn samples_per_second(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs <= 0.0 || self.batch_size == 0 {
            return 0.0;
        }
        self.batch_size as f64 / secs
    }

    /// The slowest recorded step.
    pub fn slowest_step(&self) -> Option<&StepMetrics> {
        self.step_metrics.iter().max_by_key(|m| m.duration)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let peak_mb = self.peak_memory_bytes as f64 / (1024.0 * 1024.0);
        let mut s = format!(
            "Traversal: {:.2}ms total, {} steps, {:.2}ms forward, {:.2}ms backward, \
             peak {:.2} MB, batch {} ({:.1} samples/s)",
            self.total_duration.as_secs_f64() * 1000.0,
            self.step_metrics.len(),
            self.forward_duration.as_secs_f64() * 1000.0,
            self.backward_duration.as_secs_f64() * 1000.0,
            peak_mb,
            self.batch_size,
            self.samples_per_second(),
        );
        if let Some(slowest) = self.slowest_step() {
            s.push_str(&format!(
                ", slowest {:?} '{}' {:.2}ms",
                slowest.kind,
                slowest.node,
                slowest.duration.as_secs_f64() * 1000.0
            ));
        }
        s
    }
}
