use std::collections::HashMap;

use crate::model::board::{Card, Comment};

/// Comments grouped by card, oldest first.
pub struct CommentIndex {
    by_card: HashMap<String, Vec<Comment>>,
    len: usize,
}

impl CommentIndex {
    pub fn new(comments: Vec<Comment>) -> Self {
        let len = comments.len();
        let mut by_card: HashMap<String, Vec<Comment>> = HashMap::new();
        for comment in comments {
            by_card.entry(comment.card_id.clone()).or_default().push(comment);
        }
        // stable: same-timestamp comments keep export order
        for group in by_card.values_mut() {
            group.sort_by_key(|c| c.date);
        }
        Self { by_card, len }
    }

    pub fn for_card(&self, card: &Card) -> &[Comment] {
        self.by_card.get(&card.id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }
}
