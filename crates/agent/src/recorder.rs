//! Best-effort observability for one agent invocation.
//!
//! Every method here swallows telemetry failures: a broken trace store is
//! logged and never fails the retrieval itself.

use magnet_core::error::ToolError;
use magnet_core::provider::ProviderResponse;
use magnet_telemetry::{Span, SpanKind, TelemetryEngine};
use magnet_tools::{ToolInvocation, ToolOutput};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

/// Feature name under which agent invocations are aggregated.
pub const FEATURE: &str = "knowledge_graph_agent";

/// A span that has started but not yet been recorded.
///
/// Empty when telemetry is disabled.
#[derive(Debug, Default)]
pub struct OpenSpan(Option<Span>);

impl OpenSpan {
    fn id(&self) -> Option<&str> {
        self.0.as_ref().map(|s| s.id.as_str())
    }
}

/// Records the run, iteration, completion and tool spans of one invocation.
pub struct ObservabilityRecorder {
    telemetry: Option<Arc<TelemetryEngine>>,
    trace_id: Option<String>,
    run: OpenSpan,
    finished: bool,
}

impl ObservabilityRecorder {
    /// Start the invocation's trace and its root span.
    pub fn start(telemetry: Option<Arc<TelemetryEngine>>, graph_id: &str, question: &str) -> Self {
        let trace_id = telemetry.as_ref().map(|t| t.start_trace(FEATURE, graph_id));
        let run = OpenSpan(telemetry.as_ref().map(|_| {
            Span::new(SpanKind::Run, FEATURE)
                .with_input(json!({ "graph_id": graph_id, "question": question }))
        }));
        Self {
            telemetry,
            trace_id,
            run,
            finished: false,
        }
    }

    pub fn begin_iteration(&self, iteration: u32, offered: &[String]) -> OpenSpan {
        self.open(SpanKind::Iteration, format!("iteration {iteration}"), self.run.id(), || {
            json!({ "iteration": iteration, "offered_tools": offered })
        })
    }

    pub fn end_iteration(&self, span: OpenSpan, success: bool) {
        self.close(span, success, None);
    }

    /// Record a finished completion call with its token usage and cost.
    pub fn record_completion(
        &self,
        parent: &OpenSpan,
        model_system_name: &str,
        result: Result<(&ProviderResponse, bool), &str>,
        duration_ms: u64,
    ) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };

        let mut span = Span::new(SpanKind::LlmCall, model_system_name);
        if let Some(parent_id) = parent.id() {
            span = span.with_parent(parent_id);
        }

        let success = match result {
            Ok((response, cached)) => {
                if let Some(usage) = &response.usage {
                    // Cached responses cost nothing.
                    let cost = if cached {
                        0.0
                    } else {
                        telemetry.compute_cost(
                            &response.model,
                            usage.prompt_tokens,
                            usage.completion_tokens,
                        )
                    };
                    span.record_tokens(usage.prompt_tokens, usage.completion_tokens, cost);
                }
                let tool_calls: Vec<&str> = response
                    .message
                    .tool_calls
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect();
                span.set_output(json!({
                    "model": response.model,
                    "cached": cached,
                    "tool_calls": tool_calls,
                }));
                true
            }
            Err(reason) => {
                span.set_description(reason);
                false
            }
        };

        span.end(success);
        span.duration_ms = Some(duration_ms);
        self.record(span);
    }

    /// Open a tool span with the decoded arguments as input.
    pub fn begin_tool(&self, parent: &OpenSpan, invocation: &ToolInvocation) -> OpenSpan {
        self.open(
            SpanKind::ToolExecution,
            invocation.name().to_string(),
            parent.id(),
            || invocation.arguments(),
        )
    }

    /// Close a tool span with the effective search input and a bounded view
    /// of the result set.
    pub fn end_tool(&self, span: OpenSpan, result: Result<&ToolOutput, &ToolError>) {
        let OpenSpan(Some(mut span)) = span else {
            return;
        };
        let success = match result {
            Ok(output) => {
                if let Some(input) = output.search_input() {
                    span.input = serde_json::to_value(input).ok();
                }
                span.set_output(output.trace_payload());
                if let ToolOutput::Exit {
                    reasoning: Some(reasoning),
                    ..
                } = output
                {
                    span.set_description(reasoning.clone());
                }
                true
            }
            Err(e) => {
                span.set_description(e.to_string());
                false
            }
        };
        span.end(success);
        self.record(span);
    }

    /// Close the root span and the trace, folding it into feature metrics.
    pub fn finish(mut self, success: bool, content: &str, source_count: usize) {
        self.finished = true;
        let output = json!({ "content": content, "sources": source_count });
        self.end_run(success, output);
    }

    fn end_run(&mut self, success: bool, output: serde_json::Value) {
        let Some(telemetry) = self.telemetry.clone() else {
            return;
        };
        let run = std::mem::take(&mut self.run);
        self.close(run, success, Some(output));
        if let Some(trace_id) = &self.trace_id
            && let Err(e) = telemetry.end_trace(trace_id, success)
        {
            error!(trace_id = %trace_id, error = %e, "Failed to finish agent trace");
        }
    }

    fn open(
        &self,
        kind: SpanKind,
        label: String,
        parent_id: Option<&str>,
        input: impl FnOnce() -> serde_json::Value,
    ) -> OpenSpan {
        if self.telemetry.is_none() {
            return OpenSpan::default();
        }
        let mut span = Span::new(kind, label).with_input(input());
        if let Some(parent_id) = parent_id {
            span = span.with_parent(parent_id);
        }
        OpenSpan(Some(span))
    }

    fn close(&self, span: OpenSpan, success: bool, output: Option<serde_json::Value>) {
        let OpenSpan(Some(mut span)) = span else {
            return;
        };
        if let Some(output) = output {
            span.set_output(output);
        }
        span.end(success);
        self.record(span);
    }

    fn record(&self, span: Span) {
        let (Some(telemetry), Some(trace_id)) = (&self.telemetry, &self.trace_id) else {
            return;
        };
        if let Err(e) = telemetry.record_span(trace_id, span) {
            error!(trace_id = %trace_id, error = %e, "Failed to record span");
        }
    }
}

/// A recorder dropped before `finish` belongs to a cancelled invocation:
/// its trace is closed as failed so it is counted and can be evicted.
impl Drop for ObservabilityRecorder {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(trace_id) = &self.trace_id {
            warn!(trace_id = %trace_id, "Agent invocation dropped before finishing");
        }
        self.end_run(false, json!({ "cancelled": true }));
    }
}
