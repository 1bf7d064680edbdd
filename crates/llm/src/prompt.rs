//! Prompt assembly for grounded answers.
//!
//! Builds the generation prompt from the fused retrieval context under a
//! character budget, with numbered source blocks the formatter and the
//! extraction layer can refer back to.

use knowledge_agent_config::constants::prompt;
use knowledge_agent_core::FusedCandidate;

/// Prompt configuration
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Total character budget for the grounding context
    pub context_budget_chars: usize,
    /// Per-candidate snippet cap
    pub snippet_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_budget_chars: prompt::CONTEXT_BUDGET_CHARS,
            snippet_chars: prompt::SNIPPET_CHARS,
        }
    }
}

/// Builds generation prompts from retrieval context.
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Grounded-answer prompt: system preamble, numbered source blocks,
    /// then the question. Candidates that do not fit the budget are
    /// dropped from the end of the ranking.
    pub fn build_grounded(&self, question: &str, candidates: &[FusedCandidate]) -> String {
        let mut context = String::new();
        let mut included = 0usize;

        for (i, fc) in candidates.iter().enumerate() {
            let snippet = truncate_at_word(&fc.candidate.content, self.config.snippet_chars);
            let block = format!(
                "[Source {}] {}\n{}\n\n",
                i + 1,
                fc.candidate.locator.path,
                snippet
            );
            if context.len() + block.len() > self.config.context_budget_chars {
                break;
            }
            context.push_str(&block);
            included += 1;
        }

        if included < candidates.len() {
            tracing::debug!(
                included,
                total = candidates.len(),
                "context budget reached, dropping lowest-ranked candidates"
            );
        }

        if context.is_empty() {
            return self.build_direct(question);
        }

        format!(
            "You answer questions about a document corpus. Use only the numbered \
sources below; when a source supports a statement, cite it as [Source N]. \
If the sources do not contain the answer, say so.\n\n\
{context}Question: {question}\n\nAnswer:"
        )
    }

    /// Ungrounded prompt for the generation-only fallback path.
    pub fn build_direct(&self, question: &str) -> String {
        format!(
            "Answer the question below from general knowledge. No supporting \
documents were retrieved, so state clearly that the answer is not backed by \
the corpus.\n\nQuestion: {question}\n\nAnswer:"
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(PromptConfig::default())
    }
}

/// Truncate at a word boundary, appending an ellipsis when cut.
fn truncate_at_word(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let mut cut = max_len;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let truncated = &text[..cut];
    match truncated.rfind(char::is_whitespace) {
        Some(last_space) if last_space > 0 => format!("{}...", &text[..last_space]),
        _ => format!("{truncated}..."),
    }
}
