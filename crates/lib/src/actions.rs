//! Follow-up action extraction from model output.
//!
//! The formatting prompt asks the model to end its reply with suggested follow-ups,
//! one per line, each starting with [`ACTION_MARKER`]. Every such line becomes an
//! action label (the rest of the line, trimmed).

use regex::Regex;
use std::sync::OnceLock;

/// Line prefix that marks a suggested follow-up action.
pub const ACTION_MARKER: &str = "- ";

fn action_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("(?m)^{}(.+)$", regex::escape(ACTION_MARKER)))
            .expect("action line pattern is valid")
    })
}

/// Action labels in document order, one per marked line. Duplicates are kept; a line of
/// only spaces after the marker yields an empty label.
pub fn extract_actions(text: &str) -> Vec<String> {
    action_line_regex()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}
