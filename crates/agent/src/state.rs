//! Per-invocation loop state.

use magnet_core::knowledge::ChunkHit;
use magnet_core::message::Message;
use serde::{Deserialize, Serialize};

/// One executed tool call, for rendering a step-by-step trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub iteration: u32,
    pub tool: String,
    pub arguments: serde_json::Value,
    pub call_summary: String,
}

/// Mutable state of one `run()`; created fresh and never persisted.
#[derive(Debug, Clone)]
pub struct LoopState {
    /// Chat history followed by this invocation's assistant and tool turns.
    pub messages: Vec<Message>,
    /// Document filter from the most recent document search.
    pub relevant_document_ids: Vec<String>,
    /// Every chunk hit across iterations, duplicates included.
    pub collected_chunks: Vec<ChunkHit>,
    /// 1-based; 0 before the first iteration starts.
    pub iteration_index: u32,
    pub max_iterations: u32,
    terminal_answer: Option<String>,
    error_answer: Option<String>,
    pub workflow_steps: Vec<WorkflowStep>,
}

impl LoopState {
    pub fn new(history: Vec<Message>, max_iterations: u32) -> Self {
        Self {
            messages: history,
            relevant_document_ids: Vec::new(),
            collected_chunks: Vec::new(),
            iteration_index: 0,
            max_iterations: max_iterations.max(1),
            terminal_answer: None,
            error_answer: None,
            workflow_steps: Vec::new(),
        }
    }

    /// Move to the next iteration. Returns `false` once the budget is spent.
    pub fn advance(&mut self) -> bool {
        if self.iteration_index >= self.max_iterations {
            return false;
        }
        self.iteration_index += 1;
        true
    }

    /// Iterations left after the current one.
    pub fn remaining(&self) -> u32 {
        self.max_iterations.saturating_sub(self.iteration_index)
    }

    pub fn is_final_iteration(&self) -> bool {
        self.remaining() == 0
    }

    pub fn is_finished(&self) -> bool {
        self.terminal_answer.is_some() || self.error_answer.is_some()
    }

    /// Record the final answer. Ignored once an error answer exists.
    pub fn set_terminal_answer(&mut self, answer: impl Into<String>) {
        if self.error_answer.is_none() {
            self.terminal_answer = Some(answer.into());
        }
    }

    /// Record a failure. Replaces any terminal answer from the same batch.
    pub fn set_error_answer(&mut self, answer: impl Into<String>) {
        self.terminal_answer = None;
        self.error_answer = Some(answer.into());
    }

    pub fn terminal_answer(&self) -> Option<&str> {
        self.terminal_answer.as_deref()
    }

    pub fn error_answer(&self) -> Option<&str> {
        self.error_answer.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_budget_is_enforced() {
        let mut state = LoopState::new(vec![Message::user("hi")], 2);
        assert!(state.advance());
        assert_eq!(state.iteration_index, 1);
        assert!(!state.is_final_iteration());
        assert!(state.advance());
        assert!(state.is_final_iteration());
        assert!(!state.advance());
        assert_eq!(state.iteration_index, 2);
    }

    #[test]
    fn zero_budget_still_allows_one_iteration() {
        let mut state = LoopState::new(Vec::new(), 0);
        assert!(state.advance());
        assert!(state.is_final_iteration());
    }

    #[test]
    fn at_most_one_answer_kind() {
        let mut state = LoopState::new(Vec::new(), 4);
        state.set_terminal_answer("done");
        state.set_error_answer("failed");
        assert!(state.terminal_answer().is_none());
        assert_eq!(state.error_answer(), Some("failed"));

        state.set_terminal_answer("late");
        assert!(state.terminal_answer().is_none());
        assert!(state.is_finished());
    }
}
