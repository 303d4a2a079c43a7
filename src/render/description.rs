use std::path::Path;

use super::{append_section, join_sections};
use crate::error::MigrationError;
use crate::ledger::Ledger;
use crate::model::board::{Attachment, Card};
use crate::model::sorted_by_pos;
use crate::query::{Indexes, UploadIndex};
use crate::resolve::{pin_card_numbers, replace_mentions, SourceLinks};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// First-pass issue body. Card links still point at the source; numeric
/// tags are already pinned to source URLs.
pub fn render_description(card: &Card, ix: &Indexes) -> Result<String, MigrationError> {
    let mut body = card.desc.clone();
    if let Some(checklists) = ix.checklists.render_section(&card.id_checklists) {
        body = append_section(&body, &checklists);
    }
    body = replace_mentions(&body, &ix.members);
    if let Some(attachments) = attachments_section(&card.attachments, &ix.links, &ix.uploads) {
        body = append_section(&body, &attachments);
    }
    let body = pin_card_numbers(&body, &ix.cards)?;

    Ok(join_sections(&[card_header(card), body]))
}

/// Second-pass issue body: the first pass with card links rewritten to
/// target issue numbers.
pub fn render_resolved_description(
    card: &Card,
    ix: &Indexes,
    ledger: &Ledger,
) -> Result<String, MigrationError> {
    let body = render_description(card, ix)?;
    Ok(ix.links.remap_to_target(&body, &ix.cards, ledger))
}

fn card_header(card: &Card) -> String {
    format!(
        "> Migrated from [Trello Card {}]({})",
        card.id_short,
        escape_url(&card.short_url)
    )
}

/// Encode slashes so the link remapper does not touch this citation.
fn escape_url(url: &str) -> String {
    url.replace('/', "&#x002f;")
}

fn attachments_section(
    attachments: &[Attachment],
    links: &SourceLinks,
    uploads: &UploadIndex,
) -> Option<String> {
    if attachments.is_empty() {
        return None;
    }

    let mut related = Vec::new();
    let mut uploaded = Vec::new();
    for a in sorted_by_pos(attachments) {
        if a.is_upload {
            let bang = if is_image(&a.name) { "!" } else { "" };
            uploaded.push(format!("* {bang}[{}]({})", a.name, uploads.remap(&a.url)));
        } else if links.is_target_object(&a.url) || links.is_source_card(&a.url) || a.name == a.url {
            // a named link would end up as [#123](#123) after remapping
            related.push(format!("* {}", a.url));
        } else {
            related.push(format!("* [{}]({})", a.name, a.url));
        }
    }

    let mut sections = Vec::new();
    if !related.is_empty() {
        sections.push(format!("## Related\n\n{}", related.join("\n")));
    }
    if !uploaded.is_empty() {
        sections.push(format!("## Attachments\n\n{}", uploaded.join("\n")));
    }
    Some(join_sections(&sections))
}

fn is_image(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
