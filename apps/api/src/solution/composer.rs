//! Prompt composition — pure with respect to its inputs.
//!
//! Same entry and same history always yield the same prompt text, which is
//! what lets the orchestration layer be tested without the completion
//! provider in the loop.

use std::fmt::Write;

use crate::models::diary::DiaryEntry;
use crate::models::solution::FeedbackLog;
use crate::solution::prompts::{
    ACTION_GUIDELINES, CAUTIONS, CLOSING, HISTORY_HEADER, NO_HISTORY_MARKER, PERSONA,
};

/// Assembles the full generation prompt: persona, guidelines, cautions,
/// scored history from the retrieved entries, the current entry verbatim,
/// and the closing length cap.
///
/// `history` arrives in retrieval rank order; only rows with a nonzero
/// score are rendered. Zero-scored rows are generations the user never
/// rated and carry no signal.
pub fn build_solution_prompt(entry: &DiaryEntry, history: &[FeedbackLog]) -> String {
    let mut prompt = String::new();

    prompt.push_str(PERSONA);
    prompt.push('\n');
    prompt.push_str(ACTION_GUIDELINES);
    prompt.push('\n');
    prompt.push_str(CAUTIONS);
    prompt.push('\n');

    prompt.push_str(HISTORY_HEADER);
    let mut has_history = false;
    for log in history.iter().filter(|log| log.eval_score > 0) {
        let _ = writeln!(prompt, "- Advice: \"{}\"", log.content);
        let _ = writeln!(prompt, "  (Score: {}/5)", log.eval_score);
        has_history = true;
    }
    if !has_history {
        prompt.push_str(NO_HISTORY_MARKER);
    }
    prompt.push('\n');

    prompt.push_str("[The User's Current Situation]\n");
    let _ = writeln!(prompt, "- Emotion: {}", entry.emotion);
    let _ = writeln!(prompt, "- Emotion intensity (0-100): {}", entry.intensity);
    let _ = writeln!(prompt, "- Diary entry: \"{}\"", entry.body);
    prompt.push('\n');

    prompt.push_str(CLOSING);
    prompt
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
