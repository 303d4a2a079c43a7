//! Read-only indexes over the board snapshot, built once and passed
//! explicitly to the renderers and resolvers.

pub mod cards;
pub mod checklists;
pub mod comments;
pub mod members;
pub mod uploads;

use std::collections::HashMap;

pub use cards::CardIndex;
pub use checklists::ChecklistIndex;
pub use comments::CommentIndex;
pub use members::MemberIndex;
pub use uploads::{AttachmentHost, UploadIndex};

use crate::model::board::Board;
use crate::resolve::SourceLinks;

/// Every index the renderers need, borrowed from one board.
pub struct Indexes<'a> {
    pub cards: CardIndex<'a>,
    pub members: MemberIndex,
    pub checklists: ChecklistIndex<'a>,
    pub comments: CommentIndex,
    pub uploads: UploadIndex,
    pub links: SourceLinks,
}

impl<'a> Indexes<'a> {
    pub fn build(
        board: &'a Board,
        logins: &HashMap<String, String>,
        host: AttachmentHost,
        links: SourceLinks,
    ) -> Self {
        Self {
            cards: CardIndex::new(&board.cards, &links),
            members: MemberIndex::new(&board.members, logins),
            checklists: ChecklistIndex::new(&board.checklists),
            comments: CommentIndex::new(board.comments()),
            uploads: UploadIndex::new(&board.cards, host),
            links,
        }
    }
}
