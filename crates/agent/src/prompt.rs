//! System prompt values for the retrieval agent.
//!
//! The prompt template itself comes from the template store; this module
//! only produces the text of its placeholders. Strategy, output format and
//! answer mode change wording here and nowhere else.

use magnet_core::settings::{AgentOptions, AnswerMode, OutputFormat, PromptTemplate, RetrievalExample, Strategy};
use std::collections::HashMap;

use crate::error::LoopError;

/// Template system name of the agent's ReAct prompt.
pub const AGENT_PROMPT_SYSTEM_NAME: &str = "KNOWLEDGE_GRAPH_AGENT";

pub const EXIT_INSTRUCTIONS: &str = "exitInstructions";
pub const OUTPUT_INSTRUCTIONS: &str = "outputInstructions";
pub const EXAMPLE_LIST: &str = "exampleList";

const FORCED_ANSWER: &str = "This is your last step. Call the `exit` tool now with the best \
answer you can give from the context gathered so far. If nothing relevant was found, say so \
plainly instead of guessing.";

/// Reject templates the loop cannot drive.
pub fn validate_template(template: &PromptTemplate) -> Result<(), LoopError> {
    let placeholder = format!("{{{EXIT_INSTRUCTIONS}}}");
    if !template.text.contains(&placeholder) {
        return Err(LoopError::Configuration(format!(
            "prompt template '{}' has no {placeholder} placeholder",
            template.system_name
        )));
    }
    if template.model.trim().is_empty() {
        return Err(LoopError::Configuration(format!(
            "prompt template '{}' names no model",
            template.system_name
        )));
    }
    Ok(())
}

/// Placeholder values for one iteration.
///
/// `remaining` is the number of iterations left after this one; at zero the
/// exit instructions demand an answer.
pub fn template_values(
    options: &AgentOptions,
    examples: &[RetrievalExample],
    remaining: u32,
) -> HashMap<String, String> {
    HashMap::from([
        (EXIT_INSTRUCTIONS.to_string(), exit_instructions(options.strategy, remaining)),
        (
            OUTPUT_INSTRUCTIONS.to_string(),
            output_instructions(options.output_format, options.answer_mode),
        ),
        (EXAMPLE_LIST.to_string(), example_list(examples)),
    ])
}

pub fn exit_instructions(strategy: Strategy, remaining: u32) -> String {
    if remaining == 0 {
        return FORCED_ANSWER.to_string();
    }

    let policy = match strategy {
        Strategy::Confidence => {
            "Call the `exit` tool as soon as the retrieved context answers the question with confidence."
        }
        Strategy::Exhaustive => {
            "Search from several angles and check related documents before calling the `exit` tool, \
             so the answer covers every relevant detail."
        }
        Strategy::Efficient => {
            "Use as few searches as possible. Call the `exit` tool right after the first search \
             that returns relevant context."
        }
    };
    let steps = if remaining == 1 { "step" } else { "steps" };
    format!("{policy} You have {remaining} more search {steps} before you must answer.")
}

pub fn output_instructions(format: OutputFormat, mode: AnswerMode) -> String {
    let format = match format {
        OutputFormat::Markdown => "Format the answer as Markdown, using lists and headings where they help.",
        OutputFormat::Plain => "Write the answer as plain text without any Markdown formatting.",
    };
    let mode = match mode {
        AnswerMode::AnswerWithSources => {
            "The sources you used are shown next to the answer, so do not list them in the text."
        }
        AnswerMode::AnswerOnly => {
            "Only the answer is shown to the user, so make it complete and self-contained."
        }
        AnswerMode::SourcesOnly => {
            "Only the retrieved sources are shown to the user; keep the answer to a single sentence."
        }
    };
    format!("{format} {mode}")
}

/// Numbered examples, or an empty string when there are none.
pub fn example_list(examples: &[RetrievalExample]) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(i, example)| {
            let title = if example.title.is_empty() {
                format!("Example {}", i + 1)
            } else {
                example.title.clone()
            };
            format!(
                "{}. {title}\nQuestion: {}\nAnswer: {}",
                i + 1,
                example.input,
                example.output
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
