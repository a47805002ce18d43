//! Shared plumbing of the similarity-search tools: execution context,
//! parameter resolution and client-side threshold filtering.

use magnet_core::knowledge::{Embedder, VectorSearch};
use magnet_core::settings::{RetrievalToolConfig, SearchControl};
use serde::Serialize;
use std::collections::HashMap;

use crate::args::SimilaritySearchArgs;

/// Everything a retrieval tool needs for one call.
pub struct ToolContext<'a> {
    pub graph_id: &'a str,
    pub embedding_model: &'a str,
    pub embedder: &'a dyn Embedder,
    pub search: &'a dyn VectorSearch,
    /// Per-tool configuration of the graph, keyed by wire name.
    pub tool_configs: &'a HashMap<String, RetrievalToolConfig>,
    /// Document filter from the most recent document search.
    pub relevant_document_ids: &'a [String],
    /// Used when the model sends no query.
    pub fallback_query: &'a str,
    /// Upper bound on a model-chosen `limit`.
    pub max_agent_limit: usize,
}

/// Server-side defaults of a search tool.
#[derive(Debug, Clone, Copy)]
pub struct SearchDefaults {
    pub limit: usize,
    pub score_threshold: f32,
}

pub const DOCUMENT_DEFAULTS: SearchDefaults = SearchDefaults {
    limit: 5,
    score_threshold: 0.5,
};

pub const CHUNK_DEFAULTS: SearchDefaults = SearchDefaults {
    limit: 10,
    score_threshold: 0.5,
};

/// The effective parameters of one search, recorded as span input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchInput {
    pub query: String,
    pub num_results: usize,
    pub score_threshold: f32,
}

impl SearchInput {
    /// Combine model arguments, graph configuration and defaults.
    ///
    /// Model-chosen values only count under agent search control and are
    /// clamped to `[1, max_agent_limit]` and `[0, 1]`.
    pub fn resolve(
        args: &SimilaritySearchArgs,
        config: Option<&RetrievalToolConfig>,
        defaults: SearchDefaults,
        ctx: &ToolContext<'_>,
    ) -> Self {
        let configured_limit = config.and_then(|c| c.limit).unwrap_or(defaults.limit);
        let configured_threshold = config
            .and_then(|c| c.score_threshold)
            .unwrap_or(defaults.score_threshold);
        let agent_control =
            config.is_some_and(|c| c.search_control == SearchControl::Agent);

        let (num_results, score_threshold) = if agent_control {
            (
                args.limit
                    .unwrap_or(configured_limit)
                    .clamp(1, ctx.max_agent_limit.max(1)),
                args.score_threshold
                    .unwrap_or(configured_threshold)
                    .clamp(0.0, 1.0),
            )
        } else {
            (configured_limit, configured_threshold)
        };

        let query = if args.query.trim().is_empty() {
            ctx.fallback_query.to_string()
        } else {
            args.query.clone()
        };

        Self {
            query,
            num_results,
            score_threshold,
        }
    }
}

/// Drop hits under `min_score`, order best first, keep at most `limit`.
pub fn filter_hits<T>(
    mut hits: Vec<T>,
    min_score: f32,
    limit: usize,
    score: impl Fn(&T) -> f32,
) -> Vec<T> {
    hits.retain(|h| score(h) >= min_score);
    hits.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}
