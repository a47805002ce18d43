//! `findChunksBySimilarity`: fine-grained search over chunks, restricted to
//! the documents of the latest document search when there is one.

use magnet_core::error::ToolError;
use magnet_core::knowledge::ChunkHit;
use magnet_core::tool::ToolName;
use tracing::debug;

use crate::args::SimilaritySearchArgs;
use crate::search::{CHUNK_DEFAULTS, SearchInput, ToolContext, filter_hits};

pub const DESCRIPTION: &str = "Find document chunks semantically similar to the query. \
When relevant documents were found earlier, only their chunks are searched.";

pub async fn find_chunks(
    args: &SimilaritySearchArgs,
    ctx: &ToolContext<'_>,
) -> Result<(SearchInput, Vec<ChunkHit>), ToolError> {
    let name = ToolName::FindChunksBySimilarity;
    let input = SearchInput::resolve(args, ctx.tool_configs.get(name.as_str()), CHUNK_DEFAULTS, ctx);

    let vector = ctx
        .embedder
        .embed(&input.query, ctx.embedding_model)
        .await
        .map_err(|source| ToolError::Search {
            tool_name: name.to_string(),
            source,
        })?;

    let only_doc_ids = (!ctx.relevant_document_ids.is_empty()).then_some(ctx.relevant_document_ids);
    let raw = ctx
        .search
        .search_chunks(ctx.graph_id, &vector, input.num_results, only_doc_ids)
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
        restricted = only_doc_ids.map_or(0, <[String]>::len),
        "Chunk search finished"
    );

    Ok((input, hits))
}
