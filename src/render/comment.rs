use chrono::SecondsFormat;

use super::join_sections;
use crate::error::MigrationError;
use crate::ledger::Ledger;
use crate::model::board::Comment;
use crate::query::{Indexes, MemberIndex};
use crate::resolve::{pin_card_numbers, replace_mentions};

/// Comment body with author attribution. Needs the ledger because card
/// links are resolved here directly; comments are created after every
/// issue exists.
pub fn render_comment(comment: &Comment, ix: &Indexes, ledger: &Ledger) -> Result<String, MigrationError> {
    let header = author_header(comment, &ix.members)?;

    let text = pin_card_numbers(&comment.text, &ix.cards)?;
    let text = replace_mentions(&text, &ix.members);
    let text = ix.links.remap_to_target(&text, &ix.cards, ledger);

    Ok(join_sections(&[header, text]))
}

fn author_header(comment: &Comment, members: &MemberIndex) -> Result<String, MigrationError> {
    let login = members
        .login_for(&comment.author_id)
        .ok_or_else(|| MigrationError::UnmappedAuthor(comment.author_id.clone()))?;
    let original = comment.date.to_rfc3339_opts(SecondsFormat::Millis, true);

    Ok(format!(
        "> Migrated comment original author: @{login}\n\
         > Original date: {} [(what's this in my time zone?)](https://dencode.com/en/date/ctime?v={})",
        comment.date.format("%a, %d %b %Y %H:%M:%S GMT"),
        urlencoding::encode(&original)
    ))
}
