//! Data model for retrieval traces, spans and per-feature metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Span ──────────────────────────────────────────────────────────────────

/// The kind of work a span represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// One whole agent invocation.
    Run,
    /// One pass of the reasoning loop.
    Iteration,
    /// A completion request.
    LlmCall,
    /// A retrieval tool call.
    ToolExecution,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Iteration => write!(f, "iteration"),
            Self::LlmCall => write!(f, "llm_call"),
            Self::ToolExecution => write!(f, "tool_execution"),
        }
    }
}

/// A single traced unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    /// Parent span id (None for root spans).
    pub parent_id: Option<String>,
    pub kind: SpanKind,
    /// Tool name, model name or iteration label.
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    /// What went in (search parameters, rendered prompt variables).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    /// What came out (capped hit list with text snippets, answer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Free-text note, e.g. the model's reasoning for `exit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    /// Estimated cost in USD.
    pub cost_usd: Option<f64>,
    pub success: Option<bool>,
}

impl Span {
    pub fn new(kind: SpanKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            kind,
            label: label.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input: None,
            output: None,
            description: None,
            input_tokens: None,
            output_tokens: None,
            cost_usd: None,
            success: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn set_output(&mut self, output: serde_json::Value) {
        self.output = Some(output);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Mark the span as ended with the given success status.
    pub fn end(&mut self, success: bool) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.success = Some(success);
    }

    /// Record token usage and its cost.
    pub fn record_tokens(&mut self, input: u32, output: u32, cost: f64) {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
        self.cost_usd = Some(cost);
    }

    /// Total tokens (input + output), or 0 if not recorded.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All spans of one agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    /// Feature that produced the trace, e.g. `knowledge_graph_agent`.
    pub feature: String,
    /// Instance of the feature, e.g. the knowledge graph id.
    pub instance_id: String,
    pub spans: Vec<Span>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
}

impl Trace {
    pub fn new(feature: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            feature: feature.into(),
            instance_id: instance_id.into(),
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            success: None,
        }
    }

    pub fn add_span(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn end(&mut self, success: bool) {
        self.ended_at = Some(Utc::now());
        self.success = Some(success);
    }

    /// Total cost across all spans in USD.
    pub fn total_cost(&self) -> f64 {
        self.spans.iter().filter_map(|s| s.cost_usd).sum()
    }

    pub fn total_tokens(&self) -> u32 {
        self.spans.iter().map(|s| s.total_tokens()).sum()
    }

    /// Wall-clock duration from start to end.
    pub fn duration_ms(&self) -> u64 {
        self.ended_at
            .map(|end| {
                end.signed_duration_since(self.started_at)
                    .num_milliseconds()
                    .max(0) as u64
            })
            .unwrap_or(0)
    }

    pub fn count(&self, kind: SpanKind) -> usize {
        self.spans.iter().filter(|s| s.kind == kind).count()
    }
}

// ── Aggregated views ──────────────────────────────────────────────────────

/// Running aggregates for one feature instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetrics {
    pub feature: String,
    pub instance_id: String,
    pub invocations: u64,
    pub errors: u64,
    pub total_latency_ms: u64,
    pub total_cost_usd: f64,
    pub total_tokens: u64,
}

impl FeatureMetrics {
    pub fn avg_latency_ms(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.invocations as f64
        }
    }

    pub(crate) fn absorb(&mut self, trace: &Trace) {
        self.invocations += 1;
        if trace.success == Some(false) {
            self.errors += 1;
        }
        self.total_latency_ms += trace.duration_ms();
        self.total_cost_usd += trace.total_cost();
        self.total_tokens += trace.total_tokens() as u64;
    }
}
