//! Retrieval tracing, cost tracking and per-feature metrics for Magnet.
//!
//! Every agent invocation is one trace: a run span, one span per loop
//! iteration, and spans for each completion and tool call. Completion spans
//! carry token usage priced from the built-in table; finished traces are
//! folded into per-feature-instance aggregates.

pub mod engine;
pub mod model;
pub mod pricing;

pub use engine::TelemetryEngine;
pub use model::{FeatureMetrics, Span, SpanKind, Trace};
pub use pricing::{ModelPricing, PricingTable};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown trace id: {0}")]
    UnknownTrace(String),

    #[error("trace already finished: {0}")]
    TraceClosed(String),
}
