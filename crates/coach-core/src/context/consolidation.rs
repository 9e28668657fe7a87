//! Folding old conversation history into the consolidated summary.
//!
//! The fold is lossy and one-way: exact wording of folded messages is
//! discarded, only the extracted facts survive in the summary.

use coach_types::chat::ChatMessage;

const EXTRACTION_INSTRUCTIONS: &str = "Extract and update any important information about the user, \
their goals, challenges, and progress. Keep names, identities, commitments and dates exactly as stated. \
Respond with a concise list of facts only.";

/// Number of newest messages kept verbatim for a given bound.
pub fn keep_count(max_messages: usize) -> usize {
    (max_messages / 2).max(1)
}

/// Split history into `(to_fold, to_keep)`, keeping the newest `keep` messages.
pub fn select_messages_to_fold(
    messages: &[ChatMessage],
    keep: usize,
) -> (&[ChatMessage], &[ChatMessage]) {
    if messages.len() <= keep {
        (&[], messages)
    } else {
        messages.split_at(messages.len() - keep)
    }
}

/// Fact-extraction prompt over the folded messages and the prior summary.
pub fn build_extraction_prompt(previous_summary: Option<&str>, messages: &[ChatMessage]) -> String {
    let conversation = messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Please consolidate the following conversation history into a concise summary.\n\n\
         Previous summary: {}\n\n\
         Conversation to consolidate:\n{conversation}\n\n\
         {EXTRACTION_INSTRUCTIONS}",
        previous_summary.unwrap_or("None")
    )
}

/// Append a new extract to the running summary.
pub fn merge_summary(previous: Option<&str>, extract: &str) -> String {
    match previous.filter(|s| !s.trim().is_empty()) {
        Some(previous) => format!("{previous}\n\nUpdated information: {extract}"),
        None => extract.to_string(),
    }
}
