//! Prompt assembly under a token budget
//!
//! The upstream model enforces a combined prompt+completion budget, so the
//! prompt is assembled with a hard ceiling: when the instruction, context
//! and question would exceed it, chunk text is truncated greedily starting
//! from the lowest-ranked chunk. If even the instruction and question alone
//! do not fit, assembly fails rather than sending a malformed request.

use super::AnswerError;

/// Crude token estimate: roughly four characters per token for English text.
/// Deliberately conservative; exact tokenization belongs to the provider.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// One piece of retrieved context going into a prompt
#[derive(Debug, Clone)]
pub struct ContextEntry {
    /// Name of the source document
    pub document: String,
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

/// An assembled prompt
#[derive(Debug)]
pub struct BuiltPrompt {
    pub text: String,
    /// Context entries that survived truncation
    pub entries_used: usize,
    /// True when any chunk text was cut to fit the budget
    pub truncated: bool,
}

const ANSWER_INSTRUCTION: &str =
    "Based on the following document context, answer the user's question.";
const ANSWER_GUIDANCE: &str = "Please provide a concise and accurate answer based only on the \
     provided context.\nIf the answer cannot be found in the context, say \"I cannot find this \
     information in the provided documents.\"";
const SUMMARY_INSTRUCTION: &str =
    "Please provide a comprehensive summary of the following document content:";

/// Build a question-answering prompt from ranked context entries.
///
/// Entries must be ordered best-first; truncation eats from the tail.
pub fn build_answer_prompt(
    question: &str,
    entries: &[ContextEntry],
    budget_tokens: usize,
) -> Result<BuiltPrompt, AnswerError> {
    let scaffold = format!(
        "{}\n\nContext:\n\n\nUser Question: {}\n\n{}",
        ANSWER_INSTRUCTION, question, ANSWER_GUIDANCE
    );
    let fixed_tokens = estimate_tokens(&scaffold);

    let (context, entries_used, truncated) = fit_entries(entries, budget_tokens, fixed_tokens)?;

    let text = format!(
        "{}\n\nContext:\n{}\n\nUser Question: {}\n\n{}",
        ANSWER_INSTRUCTION, context, question, ANSWER_GUIDANCE
    );

    Ok(BuiltPrompt {
        text,
        entries_used,
        truncated,
    })
}

/// Build a summarization prompt from a document's full chunk set.
///
/// Entries are in document order; when the budget is tight the tail of the
/// document is dropped first.
pub fn build_summary_prompt(
    entries: &[ContextEntry],
    budget_tokens: usize,
) -> Result<BuiltPrompt, AnswerError> {
    let scaffold = format!("{}\n\n\n\nSummary:", SUMMARY_INSTRUCTION);
    let fixed_tokens = estimate_tokens(&scaffold);

    let (context, entries_used, truncated) = fit_entries(entries, budget_tokens, fixed_tokens)?;

    let text = format!("{}\n\n{}\n\nSummary:", SUMMARY_INSTRUCTION, context);

    Ok(BuiltPrompt {
        text,
        entries_used,
        truncated,
    })
}

/// Greedily truncate entries from the lowest-ranked end until the assembled
/// prompt fits the budget. Only chunk text is cut; source headers stay
/// intact, and an entry whose text is gone is dropped entirely.
fn fit_entries(
    entries: &[ContextEntry],
    budget_tokens: usize,
    fixed_tokens: usize,
) -> Result<(String, usize, bool), AnswerError> {
    if fixed_tokens > budget_tokens {
        return Err(AnswerError::TokenBudgetExceeded {
            needed: fixed_tokens,
            budget: budget_tokens,
        });
    }

    let mut parts: Vec<(String, String)> = entries
        .iter()
        .map(|e| {
            (
                format!("Source: {}, page {}", e.document, e.page),
                e.text.clone(),
            )
        })
        .collect();
    let mut truncated = false;

    loop {
        // One extra token per entry covers the header/text separator; one per
        // gap covers the joins. Keeps the estimate an upper bound of the
        // final string.
        let context_tokens: usize = parts
            .iter()
            .map(|(h, t)| estimate_tokens(h) + estimate_tokens(t) + 1)
            .sum();
        let total = fixed_tokens + context_tokens + parts.len().saturating_sub(1);

        if total <= budget_tokens {
            break;
        }

        let excess = total - budget_tokens;
        let Some((_, text)) = parts.last_mut() else {
            break;
        };

        let text_tokens = estimate_tokens(text);
        if text_tokens <= excess {
            // Even an empty text would not fit; the whole entry goes
            parts.pop();
        } else {
            let keep_chars = text
                .chars()
                .count()
                .saturating_sub(excess * CHARS_PER_TOKEN);
            *text = text.chars().take(keep_chars).collect();
        }
        truncated = true;
    }

    if parts.is_empty() && !entries.is_empty() {
        // All context was truncated away; a context-free prompt would invite
        // a fabricated answer
        let needed = fixed_tokens
            + estimate_tokens(&entries[0].document)
            + estimate_tokens(&entries[0].text);
        return Err(AnswerError::TokenBudgetExceeded {
            needed,
            budget: budget_tokens,
        });
    }

    let entries_used = parts.len();
    let context = parts
        .iter()
        .map(|(h, t)| format!("{}\n{}", h, t))
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok((context, entries_used, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(document: &str, page: u32, text: &str) -> ContextEntry {
        ContextEntry {
            document: document.to_string(),
            page,
            text: text.to_string(),
        }
    }

    #[test]
    fn estimates_are_roughly_chars_over_four() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn prompt_contains_question_and_context() {
        let entries = vec![entry("paper.pdf", 3, "Transformers use attention.")];
        let prompt = build_answer_prompt("What architecture is used?", &entries, 8000).unwrap();

        assert!(prompt.text.contains("What architecture is used?"));
        assert!(prompt.text.contains("Source: paper.pdf, page 3"));
        assert!(prompt.text.contains("Transformers use attention."));
        assert_eq!(prompt.entries_used, 1);
        assert!(!prompt.truncated);
    }

    #[test]
    fn truncation_eats_lowest_ranked_entry_first() {
        let entries = vec![
            entry("a.pdf", 1, &"best ranked chunk ".repeat(20)),
            entry("a.pdf", 2, &"worst ranked chunk ".repeat(200)),
        ];

        // Budget fits the scaffold and the first entry comfortably, but not
        // the second one in full
        let prompt = build_answer_prompt("q?", &entries, 250).unwrap();

        assert!(prompt.truncated);
        // The first (best) entry was kept whole
        assert_eq!(prompt.text.matches("best ranked chunk").count(), 20);
    }

    #[test]
    fn budget_too_small_for_question_is_an_error() {
        let entries = vec![entry("a.pdf", 1, "context")];
        let question = "why ".repeat(100);

        let err = build_answer_prompt(&question, &entries, 10).unwrap_err();
        assert!(matches!(err, AnswerError::TokenBudgetExceeded { .. }));
    }

    #[test]
    fn budget_with_no_room_for_any_context_is_an_error() {
        let entries = vec![entry("a.pdf", 1, &"words ".repeat(4000))];

        // Scaffold fits, context cannot: even fully truncated text leaves
        // nothing usable
        let err = build_answer_prompt("q?", &entries, 80).unwrap_err();
        assert!(matches!(err, AnswerError::TokenBudgetExceeded { .. }));
    }

    #[test]
    fn built_prompt_respects_budget() {
        let entries: Vec<ContextEntry> = (0..10)
            .map(|i| entry("a.pdf", i + 1, &format!("{} ", i).repeat(300)))
            .collect();

        let budget = 500;
        let prompt = build_answer_prompt("question?", &entries, budget).unwrap();
        assert!(estimate_tokens(&prompt.text) <= budget);
    }

    #[test]
    fn summary_prompt_keeps_document_order_and_truncates_tail() {
        let entries = vec![
            entry("a.pdf", 1, &"opening section ".repeat(10)),
            entry("a.pdf", 2, &"closing section ".repeat(400)),
        ];

        let prompt = build_summary_prompt(&entries, 150).unwrap();
        assert!(prompt.truncated);
        assert!(prompt.text.contains("opening section"));
        assert!(prompt.text.contains("Summary:"));
    }

    #[test]
    fn empty_entries_build_without_context() {
        let prompt = build_summary_prompt(&[], 1000).unwrap();
        assert_eq!(prompt.entries_used, 0);
        assert!(!prompt.truncated);
    }
}
