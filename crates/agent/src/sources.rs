//! Final answer assembly: source list construction and answer modes.

use magnet_core::knowledge::ChunkHit;
use magnet_core::message::Message;
use magnet_core::settings::AnswerMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::state::WorkflowStep;

/// A chunk cited by the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document_id: String,
    pub document_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    pub chunk_id: String,
    pub chunk_title: String,
    pub chunk_content: String,
    pub score: f32,
}

impl From<&ChunkHit> for Source {
    fn from(hit: &ChunkHit) -> Self {
        Self {
            document_id: hit.document_id.clone(),
            document_name: hit.document_name.clone(),
            document_title: hit.document_title.clone(),
            chunk_id: hit.id.clone(),
            chunk_title: hit.title.clone(),
            chunk_content: hit.content.clone(),
            score: hit.score,
        }
    }
}

/// What one invocation returns to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub content: String,
    pub sources: Vec<Source>,
    pub workflow: Vec<WorkflowStep>,
    /// Full message sequence for the caller to persist.
    #[serde(skip)]
    pub messages: Vec<Message>,
    pub iterations: u32,
}

/// Best-scored unique chunks, at most `limit`.
///
/// Sorting is stable, so among equal scores the earliest-collected chunk
/// comes first; the first occurrence of an id wins.
pub fn build_sources(chunks: &[ChunkHit], limit: usize) -> Vec<Source> {
    let mut ranked: Vec<&ChunkHit> = chunks.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::new();
    ranked
        .into_iter()
        .filter(|hit| seen.insert(hit.id.as_str()))
        .take(limit)
        .map(Source::from)
        .collect()
}

/// Drop whatever `mode` does not show.
pub fn apply_answer_mode(
    mode: AnswerMode,
    content: String,
    sources: Vec<Source>,
) -> (String, Vec<Source>) {
    match mode {
        AnswerMode::AnswerWithSources => (content, sources),
        AnswerMode::AnswerOnly => (content, Vec::new()),
        AnswerMode::SourcesOnly => (String::new(), sources),
    }
}
