use std::collections::BTreeSet;

use crate::model::board::Board;
use crate::query::Indexes;

/// Pre-flight checks over the snapshot. Nothing here stops a run; the
/// findings are logged so an operator can fix the member map first.
pub fn check(board: &Board, ix: &Indexes) -> Vec<String> {
    let mut findings = Vec::new();

    let foreign = |id_board: Option<&str>| id_board.is_some_and(|b| b != board.id);

    for list in &board.lists {
        if foreign(list.id_board.as_deref()) {
            findings.push(format!("list {} belongs to another board", list.id));
        }
        if list.closed {
            findings.push(format!("list {} is archived but still becomes a column", list.name));
        }
    }
    for card in &board.cards {
        if foreign(card.id_board.as_deref()) {
            findings.push(format!("card {} (#{}) belongs to another board", card.id, card.id_short));
        }
    }
    for checklist in &board.checklists {
        if foreign(checklist.id_board.as_deref()) {
            findings.push(format!("checklist {} belongs to another board", checklist.id));
        }
    }

    // card labels are copies of the board labels, report each id once
    let mut foreign_labels = BTreeSet::new();
    for label in board.labels.iter().chain(board.cards.iter().flat_map(|c| &c.labels)) {
        if foreign(label.id_board.as_deref()) {
            foreign_labels.insert(label.id.as_str());
        }
    }
    for label in foreign_labels {
        findings.push(format!("label {label} belongs to another board"));
    }

    for member in &board.members {
        if ix.members.login_for(&member.id).is_none() {
            let name = match &member.full_name {
                Some(full_name) => format!("{} ({full_name})", member.username),
                None => member.username.clone(),
            };
            findings.push(format!("member {name} has no GitHub login and will not be assigned"));
        }
    }

    for comment in board.comments() {
        if ix.cards.get(&comment.card_id).is_none() {
            findings.push(format!(
                "comment {} is on card {} which is not on this board and will be skipped",
                comment.id, comment.card_id
            ));
        }
    }

    let unmapped_authors: BTreeSet<&str> = ix
        .cards
        .in_number_order()
        .into_iter()
        .flat_map(|card| ix.comments.for_card(card))
        .map(|c| c.author_id.as_str())
        .filter(|author| ix.members.login_for(author).is_none())
        .collect();
    for author in unmapped_authors {
        findings.push(format!(
            "comment author {author} has no GitHub login; the comments stage will fail"
        ));
    }

    for finding in &findings {
        tracing::warn!("{finding}");
    }
    findings
}
