//! The retrieval agent: a bounded reason-act loop over a knowledge graph.
//!
//! Each iteration asks the model which retrieval tool to call next, runs the
//! requested calls in order and feeds their results back. The loop ends when
//! the model calls `exit`, answers without tools, or something fails. On the
//! last iteration only `exit` is offered, so every invocation terminates
//! after at most `max_iterations` completion calls.

use magnet_config::AgentConfig;
use magnet_core::knowledge::{Embedder, VectorSearch};
use magnet_core::message::{Message, latest_user_content};
use magnet_core::provider::{ToolChoice, ToolDefinition};
use magnet_core::settings::{GraphSettings, PromptTemplate, PromptTemplateStore, SettingsResolver};
use magnet_core::tool::{ToolCallRequest, ToolCallResult, ToolName, ToolSpec};
use magnet_providers::CompletionGateway;
use magnet_telemetry::TelemetryEngine;
use magnet_tools::{ToolContext, ToolOutput, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::LoopError;
use crate::prompt::{self, AGENT_PROMPT_SYSTEM_NAME};
use crate::recorder::{ObservabilityRecorder, OpenSpan};
use crate::sources::{AgentAnswer, apply_answer_mode, build_sources};
use crate::state::{LoopState, WorkflowStep};

/// Shown when the budget runs out without an answer.
const EXHAUSTED_ANSWER: &str =
    "Sorry, I could not find an answer within the allowed number of steps. Please try rephrasing your question.";

/// Everything resolved for a graph before the loop starts.
struct Prepared {
    settings: GraphSettings,
    embedding_model: String,
    template: PromptTemplate,
    max_iterations: u32,
}

/// Answers questions against one knowledge graph at a time.
///
/// Cheap to share: every collaborator sits behind an `Arc`, and a single
/// agent serves any number of concurrent invocations.
pub struct RetrievalAgent {
    gateway: Arc<CompletionGateway>,
    embedder: Arc<dyn Embedder>,
    search: Arc<dyn VectorSearch>,
    settings: Arc<dyn SettingsResolver>,
    templates: Arc<dyn PromptTemplateStore>,
    registry: ToolRegistry,
    telemetry: Option<Arc<TelemetryEngine>>,
    limits: AgentConfig,
}

impl RetrievalAgent {
    pub fn new(
        gateway: Arc<CompletionGateway>,
        embedder: Arc<dyn Embedder>,
        search: Arc<dyn VectorSearch>,
        settings: Arc<dyn SettingsResolver>,
        templates: Arc<dyn PromptTemplateStore>,
    ) -> Self {
        Self {
            gateway,
            embedder,
            search,
            settings,
            templates,
            registry: ToolRegistry::new(),
            telemetry: None,
            limits: AgentConfig::default(),
        }
    }

    /// Record a trace per invocation in `telemetry`.
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryEngine>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Application-level defaults and caps.
    pub fn with_limits(mut self, limits: AgentConfig) -> Self {
        self.limits = limits;
        self
    }

    /// The tools a graph offers the model before its final iteration.
    pub async fn offered_tools(&self, graph_id: &str) -> Result<Vec<ToolSpec>, LoopError> {
        let settings = self
            .settings
            .graph_settings(graph_id)
            .await
            .map_err(|e| LoopError::Configuration(e.to_string()))?;
        Ok(self.registry.available_tools(&settings.retrieval_tools))
    }

    /// Answer the latest question in `history` from `graph_id`'s content.
    ///
    /// Only configuration problems are returned as errors. Failures inside
    /// the loop become a user-facing error answer with no sources.
    pub async fn run(&self, graph_id: &str, history: Vec<Message>) -> Result<AgentAnswer, LoopError> {
        let prepared = self.prepare(graph_id).await?;
        let question = latest_user_content(&history).unwrap_or_default().to_string();

        info!(
            graph_id = %graph_id,
            max_iterations = prepared.max_iterations,
            messages = history.len(),
            "Retrieval agent starting"
        );

        let recorder = ObservabilityRecorder::start(self.telemetry.clone(), graph_id, &question);
        let mut state = LoopState::new(history, prepared.max_iterations);

        let available = self.registry.available_tools(&prepared.settings.retrieval_tools);
        let exit_only: Vec<ToolSpec> = available
            .iter()
            .filter(|spec| spec.name == ToolName::Exit)
            .cloned()
            .collect();

        while !state.is_finished() && state.advance() {
            let offered = if state.is_final_iteration() {
                &exit_only
            } else {
                &available
            };
            let iteration = state.iteration_index;
            let names: Vec<String> = offered.iter().map(|s| s.name.to_string()).collect();
            debug!(graph_id = %graph_id, iteration, tools = ?names, "Agent loop iteration");

            let span = recorder.begin_iteration(iteration, &names);
            let outcome = self
                .iterate(&mut state, graph_id, &question, &prepared, offered, &recorder, &span)
                .await;
            recorder.end_iteration(span, outcome.is_ok());

            if let Err(e) = outcome {
                match &e {
                    LoopError::UnknownTool(tool) => {
                        warn!(graph_id = %graph_id, iteration, tool = %tool, "Model requested a tool that was not offered");
                    }
                    other => {
                        error!(graph_id = %graph_id, iteration, error = %other, "Agent iteration failed");
                    }
                }
                state.set_error_answer(e.user_message());
            }
        }

        if !state.is_finished() {
            error!(
                graph_id = %graph_id,
                iterations = state.iteration_index,
                "Iteration budget exhausted without an answer"
            );
            state.set_error_answer(EXHAUSTED_ANSWER);
        }

        let answer = self.finalize(state, &prepared.settings);
        let success = answer.succeeded;
        recorder.finish(success, &answer.answer.content, answer.answer.sources.len());

        info!(
            graph_id = %graph_id,
            iterations = answer.answer.iterations,
            sources = answer.answer.sources.len(),
            success,
            "Retrieval agent finished"
        );
        Ok(answer.answer)
    }

    async fn prepare(&self, graph_id: &str) -> Result<Prepared, LoopError> {
        let settings = self
            .settings
            .graph_settings(graph_id)
            .await
            .map_err(|e| LoopError::Configuration(e.to_string()))?;

        let embedding_model = self
            .settings
            .graph_embedding_model(graph_id)
            .await
            .map_err(|e| LoopError::Configuration(e.to_string()))?
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                LoopError::Configuration(format!(
                    "knowledge graph '{graph_id}' has no embedding model configured"
                ))
            })?;

        let variant = settings.retrieval_variant.as_deref();
        let template = self
            .templates
            .prompt_template(AGENT_PROMPT_SYSTEM_NAME, variant)
            .await
            .map_err(|e| LoopError::Configuration(e.to_string()))?
            .ok_or_else(|| {
                LoopError::Configuration(format!(
                    "prompt template '{AGENT_PROMPT_SYSTEM_NAME}' (variant {}) not found",
                    variant.unwrap_or("default")
                ))
            })?;
        prompt::validate_template(&template)?;

        let max_iterations = settings
            .agent
            .max_iterations
            .unwrap_or(self.limits.max_iterations)
            .max(1);

        Ok(Prepared {
            settings,
            embedding_model,
            template,
            max_iterations,
        })
    }

    /// One completion call and the tool calls it requests.
    #[allow(clippy::too_many_arguments)]
    async fn iterate(
        &self,
        state: &mut LoopState,
        graph_id: &str,
        question: &str,
        prepared: &Prepared,
        offered: &[ToolSpec],
        recorder: &ObservabilityRecorder,
        span: &OpenSpan,
    ) -> Result<(), LoopError> {
        let iteration = state.iteration_index;
        let values = prompt::template_values(
            &prepared.settings.agent,
            &prepared.settings.retrieval_examples,
            state.remaining(),
        );
        let definitions: Vec<ToolDefinition> = offered.iter().map(ToolSpec::to_definition).collect();

        let started = Instant::now();
        let result = self
            .gateway
            .complete(
                &prepared.template,
                &values,
                &state.messages,
                &definitions,
                ToolChoice::Required,
            )
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let completion = match result {
            Ok(completion) => {
                recorder.record_completion(
                    span,
                    &prepared.template.model,
                    Ok((&completion.response, completion.cached)),
                    elapsed_ms,
                );
                completion
            }
            Err(e) => {
                recorder.record_completion(span, &prepared.template.model, Err(&e.to_string()), elapsed_ms);
                return Err(e.into());
            }
        };

        let message = completion.response.message;
        if !message.has_tool_calls() {
            debug!(graph_id = %graph_id, iteration, "Completion without tool calls, using its content as the answer");
            state.set_terminal_answer(message.content.clone());
            state.messages.push(message);
            return Ok(());
        }

        let calls: Vec<ToolCallRequest> = message
            .tool_calls
            .iter()
            .map(ToolCallRequest::from_message_call)
            .collect();
        let assistant_text = message.content.clone();
        state.messages.push(message);

        for (index, call) in calls.iter().enumerate() {
            let invocation = match self.registry.parse(call, offered) {
                Ok(invocation) => invocation,
                Err(e) => {
                    let e = LoopError::from(e);
                    abandon_batch(&mut state.messages, &calls[index..], &e);
                    return Err(e);
                }
            };
            let tool_span = recorder.begin_tool(span, &invocation);

            let result = {
                let ctx = ToolContext {
                    graph_id,
                    embedding_model: &prepared.embedding_model,
                    embedder: self.embedder.as_ref(),
                    search: self.search.as_ref(),
                    tool_configs: &prepared.settings.retrieval_tools,
                    relevant_document_ids: &state.relevant_document_ids,
                    fallback_query: question,
                    max_agent_limit: self.limits.max_agent_limit,
                };
                self.registry.execute(&invocation, &ctx).await
            };
            recorder.end_tool(tool_span, result.as_ref());
            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    let e = LoopError::from(e);
                    abandon_batch(&mut state.messages, &calls[index..], &e);
                    return Err(e);
                }
            };

            debug!(
                graph_id = %graph_id,
                iteration,
                tool = %invocation.name(),
                call_id = %invocation.call_id(),
                summary = %output.summary(),
                "Tool call finished"
            );

            state.messages.push(
                ToolCallResult {
                    tool_call_id: call.id.clone(),
                    payload: output.payload(),
                }
                .to_message(),
            );
            state.workflow_steps.push(WorkflowStep {
                iteration,
                tool: invocation.name().to_string(),
                arguments: invocation.arguments(),
                call_summary: output.summary(),
            });

            match output {
                // A newer document search replaces the filter.
                ToolOutput::Documents { hits, .. } => {
                    state.relevant_document_ids = hits.into_iter().map(|h| h.id).collect();
                }
                ToolOutput::Chunks { hits, .. } => state.collected_chunks.extend(hits),
                ToolOutput::Exit { answer, .. } => {
                    let answer = if answer.trim().is_empty() {
                        assistant_text.clone()
                    } else {
                        answer
                    };
                    state.set_terminal_answer(answer);
                }
            }
        }

        Ok(())
    }

    fn finalize(&self, state: LoopState, settings: &GraphSettings) -> Finalized {
        let (content, sources, succeeded) = match state.error_answer() {
            Some(error_answer) => (error_answer.to_string(), Vec::new(), false),
            None => {
                let content = state.terminal_answer().unwrap_or_default().to_string();
                let sources = build_sources(&state.collected_chunks, self.limits.source_limit);
                let (content, sources) = apply_answer_mode(settings.agent.answer_mode, content, sources);
                (content, sources, true)
            }
        };

        Finalized {
            answer: AgentAnswer {
                content,
                sources,
                workflow: state.workflow_steps,
                messages: state.messages,
                iterations: state.iteration_index,
            },
            succeeded,
        }
    }
}

struct Finalized {
    answer: AgentAnswer,
    succeeded: bool,
}

/// Answer every call left in an aborted batch so the history stays a valid
/// conversation: the failed call gets the error, the rest are marked skipped.
fn abandon_batch(messages: &mut Vec<Message>, pending: &[ToolCallRequest], error: &LoopError) {
    for (i, call) in pending.iter().enumerate() {
        let reason = if i == 0 {
            error.to_string()
        } else {
            "Not run: an earlier call in this turn failed".to_string()
        };
        messages.push(
            ToolCallResult {
                tool_call_id: call.id.clone(),
                payload: json!({ "error": reason }),
            }
            .to_message(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use magnet_core::error::ProviderError;
    use magnet_core::message::Role;
    use magnet_core::provider::{
        EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
    };
    use magnet_core::settings::{AnswerMode, RetrievalToolConfig, SearchControl};
    use magnet_telemetry::SpanKind;
    use serde_json::json;
    use std::collections::HashMap;

    fn tools(entries: &[(&str, RetrievalToolConfig)]) -> HashMap<String, RetrievalToolConfig> {
        entries
            .iter()
            .map(|(name, config)| (name.to_string(), config.clone()))
            .collect()
    }

    /// Never answers a completion.
    struct StalledProvider;

    #[async_trait::async_trait]
    impl Provider for StalledProvider {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            std::future::pending().await
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: vec![vec![1.0, 0.0]; request.inputs.len()],
                model: request.model,
                usage: None,
            })
        }
    }

    fn settings_with_both_tools(max_iterations: Option<u32>) -> GraphSettings {
        let mut settings = GraphSettings {
            retrieval_tools: tools(&[
                ("findDocumentsBySummarySimilarity", RetrievalToolConfig::default()),
                ("findChunksBySimilarity", RetrievalToolConfig::default()),
            ]),
            ..Default::default()
        };
        settings.agent.max_iterations = max_iterations;
        settings
    }

    fn question() -> Vec<Message> {
        vec![Message::user("How do refunds work?")]
    }

    fn exit_call(id: &str, answer: &str) -> ProviderResponse {
        tool_response(vec![tool_call(id, "exit", json!({ "answer": answer }))])
    }

    fn offered_names(request: &ProviderRequest) -> Vec<String> {
        request.tools.iter().map(|t| t.name.clone()).collect()
    }

    #[tokio::test]
    async fn exit_answer_with_collected_sources() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![tool_call("call_1", "findChunksBySimilarity", json!({ "query": "refund" }))]),
            exit_call("call_2", "Refunds are accepted within 30 days."),
        ]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(answer.content, "Refunds are accepted within 30 days.");
        let ids: Vec<&str> = answer.sources.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(answer.workflow.len(), 2);
        assert_eq!(answer.workflow[0].tool, "findChunksBySimilarity");
        assert_eq!(answer.workflow[0].call_summary, "Found 2 relevant chunks");
        assert_eq!(answer.workflow[1].tool, "exit");
        assert_eq!(answer.iterations, 2);
        assert_eq!(h.provider.call_count(), 2);
        assert_eq!(h.provider.embedded_texts(), vec!["refund"]);
    }

    #[tokio::test]
    async fn loop_terminates_within_budget() {
        // The model keeps searching; only the forced final turn can stop it.
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![tool_call("a", "findChunksBySimilarity", json!({ "query": "refund" }))]),
            tool_response(vec![tool_call("b", "findChunksBySimilarity", json!({ "query": "refund" }))]),
            exit_call("c", "Done."),
        ]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(answer.content, "Done.");
        assert_eq!(h.provider.call_count(), 3);

        let requests = h.provider.requests();
        assert_eq!(offered_names(&requests[0]).len(), 3);
        assert_eq!(offered_names(&requests[2]), vec!["exit"]);
        assert_eq!(requests[2].tool_choice, Some(ToolChoice::Required));
        assert!(requests[2].messages[0].content.contains("This is your last step"));
        assert!(!requests[0].messages[0].content.contains("This is your last step"));
    }

    #[tokio::test]
    async fn search_on_final_iteration_is_unknown_tool() {
        let provider = ScriptedProvider::always(tool_response(vec![tool_call(
            "a",
            "findChunksBySimilarity",
            json!({ "query": "refund" }),
        )]));
        let h = harness(provider, settings_with_both_tools(Some(2))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(h.provider.call_count(), 2);
        assert!(answer.content.contains("contact support"));
        assert!(answer.sources.is_empty());
        assert_eq!(answer.workflow.len(), 1);
    }

    #[tokio::test]
    async fn default_budget_comes_from_config() {
        let provider = ScriptedProvider::always(tool_response(vec![tool_call(
            "a",
            "findChunksBySimilarity",
            json!({}),
        )]));
        let h = harness(provider, settings_with_both_tools(None)).await;

        h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(h.provider.call_count(), AgentConfig::default().max_iterations as usize);
    }

    #[tokio::test]
    async fn text_response_is_the_answer() {
        let provider = ScriptedProvider::new(vec![text_response("Refunds take 30 days.")]);
        let h = harness(provider, settings_with_both_tools(Some(4))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(answer.content, "Refunds take 30 days.");
        assert!(answer.workflow.is_empty());
        assert!(answer.sources.is_empty());
        assert_eq!(answer.iterations, 1);
        assert_eq!(answer.messages.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn exit_runs_remaining_calls_in_batch() {
        let provider = ScriptedProvider::new(vec![tool_response(vec![
            tool_call("a", "exit", json!({ "answer": "See the policy." })),
            tool_call("b", "findChunksBySimilarity", json!({ "query": "refund" })),
        ])]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(answer.content, "See the policy.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.workflow.len(), 2);
        assert_eq!(h.provider.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_exit_answer_falls_back_to_assistant_text() {
        let mut response = exit_call("a", "");
        response.message.content = "Refunds within 30 days.".into();
        let h = harness(ScriptedProvider::new(vec![response]), settings_with_both_tools(Some(2))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();
        assert_eq!(answer.content, "Refunds within 30 days.");
    }

    #[tokio::test]
    async fn document_search_narrows_chunk_search() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![tool_call(
                "a",
                "findDocumentsBySummarySimilarity",
                json!({ "query": "refund policy" }),
            )]),
            tool_response(vec![tool_call("b", "findChunksBySimilarity", json!({ "query": "refund" }))]),
            exit_call("c", "30 days."),
        ]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        // Only d1 clears the threshold, so c2 (from d2) is filtered out.
        let ids: Vec<&str> = answer.sources.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1"]);
        assert_eq!(answer.workflow[0].call_summary, "Found 1 relevant documents");
    }

    #[tokio::test]
    async fn second_document_search_replaces_the_filter() {
        let settings = GraphSettings {
            retrieval_tools: tools(&[
                (
                    "findDocumentsBySummarySimilarity",
                    RetrievalToolConfig {
                        search_control: SearchControl::Agent,
                        ..Default::default()
                    },
                ),
                ("findChunksBySimilarity", RetrievalToolConfig::default()),
            ]),
            ..Default::default()
        };
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![
                tool_call(
                    "a",
                    "findDocumentsBySummarySimilarity",
                    json!({ "query": "refund", "limit": 5, "scoreThreshold": 0.0 }),
                ),
                tool_call(
                    "b",
                    "findDocumentsBySummarySimilarity",
                    json!({ "query": "refund", "limit": 5, "scoreThreshold": 0.5 }),
                ),
                tool_call("c", "findChunksBySimilarity", json!({ "query": "refund" })),
            ]),
            exit_call("d", "30 days."),
        ]);
        let h = harness(provider, settings).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(answer.workflow[0].call_summary, "Found 2 relevant documents");
        assert_eq!(answer.workflow[1].call_summary, "Found 1 relevant documents");
        // A union of both searches would let c2 (from d2) through.
        let ids: Vec<&str> = answer.sources.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_closes_its_trace() {
        let (agent, telemetry) =
            agent_with(Arc::new(StalledProvider), settings_with_both_tools(Some(3))).await;

        for _ in 0..3 {
            let run = agent.run(GRAPH_ID, question());
            let outcome = tokio::time::timeout(std::time::Duration::from_millis(30), run).await;
            assert!(outcome.is_err());
        }

        let traces = telemetry.recent_traces(10);
        assert_eq!(traces.len(), 3);
        assert!(traces.iter().all(|t| t.ended_at.is_some() && t.success == Some(false)));
        let metrics = telemetry
            .feature_metrics(crate::recorder::FEATURE, GRAPH_ID)
            .unwrap();
        assert_eq!((metrics.invocations, metrics.errors), (3, 3));
    }

    #[tokio::test]
    async fn chunk_hits_accumulate_and_dedupe() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![
                tool_call("a", "findChunksBySimilarity", json!({ "query": "refund" })),
                tool_call("b", "findChunksBySimilarity", json!({ "query": "returns" })),
            ]),
            exit_call("c", "30 days."),
        ]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources[0].score >= answer.sources[1].score);
        assert_eq!(answer.workflow.len(), 3);
    }

    #[tokio::test]
    async fn answer_modes_shape_the_result() {
        for (mode, has_content, has_sources) in [
            (AnswerMode::AnswerOnly, true, false),
            (AnswerMode::SourcesOnly, false, true),
            (AnswerMode::AnswerWithSources, true, true),
        ] {
            let provider = ScriptedProvider::new(vec![
                tool_response(vec![tool_call("a", "findChunksBySimilarity", json!({ "query": "refund" }))]),
                exit_call("b", "30 days."),
            ]);
            let mut settings = settings_with_both_tools(Some(3));
            settings.agent.answer_mode = mode;
            let h = harness(provider, settings).await;

            let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();
            assert_eq!(!answer.content.is_empty(), has_content, "{mode:?}");
            assert_eq!(!answer.sources.is_empty(), has_sources, "{mode:?}");
        }
    }

    #[tokio::test]
    async fn unknown_tool_stops_the_batch() {
        let provider = ScriptedProvider::new(vec![tool_response(vec![
            tool_call("a", "deleteEverything", json!({})),
            tool_call("b", "exit", json!({ "answer": "never reached" })),
        ])]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert!(answer.content.contains("contact support"));
        assert!(answer.workflow.is_empty());
        assert_eq!(h.provider.call_count(), 1);

        // Every requested call still has a matching tool result.
        let results: Vec<&Message> = answer
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        let ids: Vec<_> = results.iter().map(|m| m.tool_call_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("a"), Some("b")]);
        assert!(results[0].content.contains("deleteEverything"));
        assert!(results[1].content.contains("Not run"));
    }

    #[tokio::test]
    async fn disabled_tool_is_not_offered() {
        let mut settings = settings_with_both_tools(Some(3));
        settings.retrieval_tools.insert(
            "findDocumentsBySummarySimilarity".into(),
            RetrievalToolConfig {
                enabled: Some(false),
                ..Default::default()
            },
        );
        let provider = ScriptedProvider::new(vec![tool_response(vec![tool_call(
            "a",
            "findDocumentsBySummarySimilarity",
            json!({ "query": "refund" }),
        )])]);
        let h = harness(provider, settings).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        let offered = offered_names(&h.provider.requests()[0]);
        assert_eq!(offered, vec!["findChunksBySimilarity", "exit"]);
        assert!(answer.content.contains("contact support"));
    }

    #[tokio::test]
    async fn malformed_arguments_use_defaults() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![raw_tool_call("a", "findChunksBySimilarity", "{not json")]),
            exit_call("b", "30 days."),
        ]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        // The question stands in for the missing query.
        assert_eq!(h.provider.embedded_texts(), vec!["How do refunds work?"]);
        assert_eq!(answer.sources.len(), 2);
    }

    #[tokio::test]
    async fn agent_controlled_limit_is_clamped() {
        let settings = GraphSettings {
            retrieval_tools: tools(&[(
                "findChunksBySimilarity",
                RetrievalToolConfig {
                    search_control: SearchControl::Agent,
                    ..Default::default()
                },
            )]),
            ..Default::default()
        };
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![tool_call(
                "a",
                "findChunksBySimilarity",
                json!({ "query": "refund", "limit": 0, "scoreThreshold": 0.0 }),
            )]),
            exit_call("b", "30 days."),
        ]);
        let h = harness(provider, settings).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        // limit 0 clamps to 1: only the best chunk survives.
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].chunk_id, "c1");
        let schema = &h.provider.requests()[0].tools[0].parameters;
        assert!(schema["properties"].get("limit").is_some());
    }

    #[tokio::test]
    async fn completion_failure_becomes_error_answer() {
        let provider = ScriptedProvider::with_results(vec![Err(ProviderError::AuthenticationFailed(
            "bad key sk-123".into(),
        ))]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        let answer = h.agent.run(GRAPH_ID, question()).await.unwrap();

        assert!(answer.content.contains("language model is unavailable"));
        assert!(!answer.content.contains("sk-123"));
        assert!(answer.sources.is_empty());

        let metrics = h
            .telemetry
            .feature_metrics(crate::recorder::FEATURE, GRAPH_ID)
            .unwrap();
        assert_eq!(metrics.errors, 1);
    }

    #[tokio::test]
    async fn search_failure_becomes_error_answer() {
        let provider = ScriptedProvider::new(vec![tool_response(vec![tool_call(
            "a",
            "findChunksBySimilarity",
            json!({ "query": "refund" }),
        )])]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;
        // Configured in the catalog but absent from the vector store.
        h.catalog
            .put_graph("orphan", settings_with_both_tools(Some(3)), Some(EMBEDDING_MODEL.into()))
            .await;

        let answer = h.agent.run("orphan", question()).await.unwrap();

        assert!(answer.content.contains("something went wrong"));
        assert!(answer.sources.is_empty());
        assert!(answer.workflow.is_empty());
    }

    #[tokio::test]
    async fn missing_embedding_model_is_configuration_error() {
        let provider = ScriptedProvider::new(vec![text_response("unused")]);
        let h = harness_with(provider, settings_with_both_tools(None), None, Some(agent_template())).await;

        let err = h.agent.run(GRAPH_ID, question()).await.unwrap_err();
        assert!(matches!(err, LoopError::Configuration(_)));
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_template_is_configuration_error() {
        let provider = ScriptedProvider::new(vec![text_response("unused")]);
        let h = harness_with(provider, settings_with_both_tools(None), Some(EMBEDDING_MODEL), None).await;

        let err = h.agent.run(GRAPH_ID, question()).await.unwrap_err();
        assert!(matches!(err, LoopError::Configuration(ref m) if m.contains(AGENT_PROMPT_SYSTEM_NAME)));
    }

    #[tokio::test]
    async fn unknown_graph_is_configuration_error() {
        let provider = ScriptedProvider::new(vec![text_response("unused")]);
        let h = harness(provider, settings_with_both_tools(None)).await;

        let err = h.agent.run("missing", question()).await.unwrap_err();
        assert!(matches!(err, LoopError::Configuration(_)));
    }

    #[tokio::test]
    async fn template_without_exit_placeholder_is_rejected() {
        let mut template = agent_template();
        template.text = "No placeholders here.".into();
        let provider = ScriptedProvider::new(vec![text_response("unused")]);
        let h = harness_with(provider, settings_with_both_tools(None), Some(EMBEDDING_MODEL), Some(template)).await;

        assert!(matches!(
            h.agent.run(GRAPH_ID, question()).await,
            Err(LoopError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn trace_covers_every_step() {
        let provider = ScriptedProvider::new(vec![
            tool_response(vec![tool_call("a", "findChunksBySimilarity", json!({ "query": "refund" }))]),
            exit_call("b", "30 days."),
        ]);
        let h = harness(provider, settings_with_both_tools(Some(3))).await;

        h.agent.run(GRAPH_ID, question()).await.unwrap();

        let trace = &h.telemetry.recent_traces(1)[0];
        assert_eq!(trace.instance_id, GRAPH_ID);
        assert_eq!(trace.success, Some(true));
        assert_eq!(trace.count(SpanKind::Run), 1);
        assert_eq!(trace.count(SpanKind::Iteration), 2);
        assert_eq!(trace.count(SpanKind::LlmCall), 2);
        assert_eq!(trace.count(SpanKind::ToolExecution), 2);
        assert_eq!(trace.total_tokens(), 240);
    }

    #[tokio::test]
    async fn offered_tools_reflect_graph_settings() {
        let provider = ScriptedProvider::new(vec![text_response("unused")]);
        let h = harness(provider, GraphSettings::default()).await;

        let offered = h.agent.offered_tools(GRAPH_ID).await.unwrap();
        let names: Vec<ToolName> = offered.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![ToolName::Exit]);
        assert_eq!(h.catalog.graph_ids().await, vec![GRAPH_ID]);
    }
}
