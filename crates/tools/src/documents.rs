//! `findDocumentsBySummarySimilarity`: coarse search over document summaries.

use magnet_core::error::ToolError;
use magnet_core::knowledge::DocumentHit;
use magnet_core::tool::ToolName;
use tracing::debug;

use crate::args::SimilaritySearchArgs;
use crate::search::{DOCUMENT_DEFAULTS, SearchInput, ToolContext, filter_hits};

pub const DESCRIPTION: &str = "Find documents whose summaries are semantically similar to the query. \
Use it to narrow the search to the most relevant documents before looking at their chunks.";

pub async fn find_documents(
    args: &SimilaritySearchArgs,
    ctx: &ToolContext<'_>,
) -> Result<(SearchInput, Vec<DocumentHit>), ToolError> {
    let name = ToolName::FindDocumentsBySummarySimilarity;
    let input = SearchInput::resolve(
        args,
        ctx.tool_configs.get(name.as_str()),
        DOCUMENT_DEFAULTS,
        ctx,
    );

    let vector = ctx
        .embedder
        .embed(&input.query, ctx.embedding_model)
        .await
        .map_err(|source| ToolError::Search {
            tool_name: name.to_string(),
            source,
        })?;

    let raw = ctx
        .search
        .search_documents(ctx.graph_id, &vector, input.num_results)
        .await
        .map_err(|source| ToolError::Search {
            tool_name: name.to_string(),
            source,
        })?;

    let raw_count = raw.len();
    let hits = filter_hits(raw, input.score_threshold, input.num_results, |h| h.score);
    debug!(
        graph_id = %ctx.graph_id,
        raw = raw_count,
        kept = hits.len(),
        threshold = input.score_threshold,
        "Document search finished"
    );

    Ok((input, hits))
}
