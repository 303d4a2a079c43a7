//! Final text payloads for issues and comments.

pub mod comment;
pub mod description;
pub mod preview;

pub use comment::render_comment;
pub use description::{render_description, render_resolved_description};

/// Trim each part, drop the empty ones and separate the rest with a
/// blank line.
fn join_sections<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Append `section` under `text`, skipping the separator when `text` is blank.
fn append_section(text: &str, section: &str) -> String {
    if text.trim().is_empty() {
        section.to_string()
    } else {
        format!("{}\n\n{section}", text.trim_end())
    }
}
