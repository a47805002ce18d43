//! `exit`: ends the loop. Pure passthrough of the model's answer.

use crate::args::ExitArgs;

pub const DESCRIPTION: &str = "Finish and give the final answer to the user. \
Call it once the gathered context is enough, or when nothing relevant can be found.";

/// The answer to return and the reasoning to record as span description.
pub fn exit(args: ExitArgs) -> (String, Option<String>) {
    (args.answer, args.reasoning.filter(|r| !r.trim().is_empty()))
}
