use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{render_comment, render_description};
use crate::ledger::Ledger;
use crate::query::Indexes;

const SEPARATOR: &str = "\n\n<hr/>\n\n";

/// Render every card and comment to `preview.md` and
/// `preview-comments.md` under `dir`. No remote calls.
pub fn write_preview(ix: &Indexes, ledger: &Ledger, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let (cards, comments) = render_preview(ix, ledger)?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let cards_path = dir.join("preview.md");
    let comments_path = dir.join("preview-comments.md");
    std::fs::write(&cards_path, cards)
        .with_context(|| format!("Failed to write {}", cards_path.display()))?;
    std::fs::write(&comments_path, comments)
        .with_context(|| format!("Failed to write {}", comments_path.display()))?;

    tracing::info!(cards = %cards_path.display(), comments = %comments_path.display(), "wrote preview");
    Ok((cards_path, comments_path))
}

fn render_preview(ix: &Indexes, ledger: &Ledger) -> Result<(String, String)> {
    let mut cards = Vec::new();
    let mut comments = Vec::new();

    for card in ix.cards.in_number_order() {
        let body = render_description(card, ix)
            .with_context(|| format!("Failed to render card {} (#{})", card.id, card.id_short))?;
        cards.push(format!("# {}\n\n{body}", card.name));

        for comment in ix.comments.for_card(card) {
            let body = render_comment(comment, ix, ledger)
                .with_context(|| format!("Failed to render comment {}", comment.id))?;
            comments.push(body);
        }
    }
    Ok((cards.join(SEPARATOR), comments.join(SEPARATOR)))
}
