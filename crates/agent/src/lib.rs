//! The Magnet AI retrieval agent.
//!
//! The agent answers a question from one knowledge graph by running a
//! bounded **reason → act → observe** loop:
//!
//! 1. **Resolve** the graph's settings, embedding model and prompt template
//! 2. **Ask the model** which retrieval tool to call, offering only the tools
//!    the graph enables
//! 3. **Run the calls** in order, narrowing chunk search to the documents
//!    found most recently and collecting chunk hits
//! 4. **Stop** when the model calls `exit` or answers without tools; on the
//!    last iteration only `exit` is offered
//! 5. **Finalize** the answer with deduplicated, score-ordered sources
//!
//! Every invocation is traced through [`magnet_telemetry`] when enabled.

pub mod error;
pub mod prompt;
pub mod recorder;
pub mod retrieval_agent;
pub mod sources;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::LoopError;
pub use prompt::AGENT_PROMPT_SYSTEM_NAME;
pub use recorder::{FEATURE, ObservabilityRecorder};
pub use retrieval_agent::RetrievalAgent;
pub use sources::{AgentAnswer, Source};
pub use state::{LoopState, WorkflowStep};
