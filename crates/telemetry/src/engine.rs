//! Thread-safe telemetry engine: collects traces, prices completion spans
//! and keeps per-feature aggregates.

use crate::TelemetryError;
use crate::model::*;
use crate::pricing::PricingTable;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Completed traces kept in memory before the oldest are dropped.
const MAX_TRACES: usize = 5_000;

/// The core telemetry engine.
///
/// Shared behind an `Arc` by every agent invocation. A panic while a lock
/// is held never disables telemetry for the rest of the process: poisoned
/// locks are recovered.
pub struct TelemetryEngine {
    pricing: PricingTable,
    /// All recorded traces (most recent last).
    traces: RwLock<Vec<Trace>>,
    /// Aggregates keyed by `(feature, instance_id)`.
    metrics: RwLock<HashMap<(String, String), FeatureMetrics>>,
}

impl TelemetryEngine {
    /// Create a new telemetry engine with default pricing.
    pub fn new() -> Self {
        Self::with_pricing(PricingTable::with_defaults())
    }

    pub fn with_pricing(pricing: PricingTable) -> Self {
        Self {
            pricing,
            traces: RwLock::new(Vec::new()),
            metrics: RwLock::new(HashMap::new()),
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    // ── Trace management ──────────────────────────────────────────────

    /// Start a new trace for one invocation of `feature` on `instance_id`.
    pub fn start_trace(&self, feature: impl Into<String>, instance_id: impl Into<String>) -> String {
        let trace = Trace::new(feature, instance_id);
        let id = trace.id.clone();
        let mut traces = self.traces_mut();

        if traces.len() >= MAX_TRACES {
            // Drop the oldest completed tenth.
            let drain_count = MAX_TRACES / 10;
            let mut removed = 0;
            traces.retain(|t| {
                if removed < drain_count && t.ended_at.is_some() {
                    removed += 1;
                    return false;
                }
                true
            });
            if traces.len() >= MAX_TRACES {
                // Everything is still open: drop the oldest regardless.
                traces.drain(..drain_count);
            }
        }

        traces.push(trace);
        id
    }

    /// Record a completed span in a trace.
    pub fn record_span(&self, trace_id: &str, span: Span) -> Result<(), TelemetryError> {
        let mut traces = self.traces_mut();
        let trace = traces
            .iter_mut()
            .find(|t| t.id == trace_id)
            .ok_or_else(|| TelemetryError::UnknownTrace(trace_id.to_string()))?;
        if trace.ended_at.is_some() {
            return Err(TelemetryError::TraceClosed(trace_id.to_string()));
        }
        trace.add_span(span);
        Ok(())
    }

    /// End a trace and fold it into its feature metrics.
    pub fn end_trace(&self, trace_id: &str, success: bool) -> Result<(), TelemetryError> {
        let finished = {
            let mut traces = self.traces_mut();
            let trace = traces
                .iter_mut()
                .find(|t| t.id == trace_id)
                .ok_or_else(|| TelemetryError::UnknownTrace(trace_id.to_string()))?;
            if trace.ended_at.is_some() {
                return Err(TelemetryError::TraceClosed(trace_id.to_string()));
            }
            trace.end(success);
            trace.clone()
        };

        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics
            .entry((finished.feature.clone(), finished.instance_id.clone()))
            .or_insert_with(|| FeatureMetrics {
                feature: finished.feature.clone(),
                instance_id: finished.instance_id.clone(),
                ..Default::default()
            })
            .absorb(&finished);

        tracing::debug!(
            trace_id = %trace_id,
            feature = %finished.feature,
            instance_id = %finished.instance_id,
            success,
            duration_ms = finished.duration_ms(),
            cost_usd = finished.total_cost(),
            "Trace finished"
        );
        Ok(())
    }

    /// Compute cost for a model call using the pricing table.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.pricing.compute_cost(model, input_tokens, output_tokens)
    }

    // ── Queries ───────────────────────────────────────────────────────

    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        self.traces().iter().find(|t| t.id == trace_id).cloned()
    }

    /// List recent traces (most recent first).
    pub fn recent_traces(&self, limit: usize) -> Vec<Trace> {
        self.traces().iter().rev().take(limit).cloned().collect()
    }

    pub fn trace_count(&self) -> usize {
        self.traces().len()
    }

    /// Aggregates for one feature instance, if it has finished any trace.
    pub fn feature_metrics(&self, feature: &str, instance_id: &str) -> Option<FeatureMetrics> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(feature.to_string(), instance_id.to_string()))
            .cloned()
    }

    /// Aggregates for every feature instance, sorted by feature then instance.
    pub fn all_metrics(&self) -> Vec<FeatureMetrics> {
        let mut all: Vec<FeatureMetrics> = self
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| (&a.feature, &a.instance_id).cmp(&(&b.feature, &b.instance_id)));
        all
    }

    fn traces(&self) -> RwLockReadGuard<'_, Vec<Trace>> {
        self.traces.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn traces_mut(&self) -> RwLockWriteGuard<'_, Vec<Trace>> {
        self.traces.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new()
    }
}
