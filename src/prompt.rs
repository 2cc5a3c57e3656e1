//! Deterministic prompt assembly.

use crate::document::Chunk;

const TASK: &str = "Task: Answer the question using ONLY the provided context.";
const RULES: &str = "Rules:\n\
    - Include all key details from the context.\n\
    - If the answer is not in the context, say \"cannot find\".\n\
    - Answer in complete sentences.";
const ANSWER_CUE: &str = "Answer (in complete sentences):";

/// Assembles the instruction prompt handed to the generation capability.
///
/// The template is fixed: task instruction, rule block, context section
/// listing chunk texts in ranking order, the question, and an answer cue.
/// An empty chunk list produces the same structure with an empty context
/// section — the rule block is what steers the model to the "cannot find"
/// answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Create a new `PromptBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Assemble the prompt from a question and ranked context chunks.
    pub fn build(&self, question: &str, chunks: &[Chunk]) -> String {
        let context = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n\n");
        format!("{TASK}\n{RULES}\n\nContext:\n{context}\n\nQuestion:\n{question}\n\n{ANSWER_CUE}\n")
    }

    /// Assemble a prompt that fits within `max_length` characters.
    ///
    /// Context chunks are dropped from the lowest-ranked end until the
    /// prompt fits; the task, rules, and question are never truncated, so
    /// the zero-context prompt is returned even if it exceeds the budget.
    pub fn build_truncated(&self, question: &str, chunks: &[Chunk], max_length: usize) -> String {
        let mut keep = chunks.len();
        loop {
            let prompt = self.build(question, &chunks[..keep]);
            if prompt.chars().count() <= max_length || keep == 0 {
                return prompt;
            }
            keep -= 1;
        }
    }
}
