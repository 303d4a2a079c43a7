use std::collections::HashMap;

use crate::model::board::Checklist;
use crate::model::sorted_by_pos;

pub struct ChecklistIndex<'a> {
    by_id: HashMap<&'a str, &'a Checklist>,
}

impl<'a> ChecklistIndex<'a> {
    pub fn new(checklists: &'a [Checklist]) -> Self {
        Self {
            by_id: checklists.iter().map(|c| (c.id.as_str(), c)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Checklist> {
        self.by_id.get(id).copied()
    }

    /// Markdown section for the given checklists, ordered by their own
    /// position. `None` when the card has no (known) checklists.
    pub fn render_section(&self, ids: &[String]) -> Option<String> {
        let mut checklists: Vec<&Checklist> = ids.iter().filter_map(|id| self.get(id)).collect();
        if checklists.is_empty() {
            return None;
        }
        checklists.sort_by(|a, b| a.pos.total_cmp(&b.pos));

        let rendered: Vec<String> = checklists.into_iter().map(as_markdown).collect();
        Some(format!("## Checklists\n\n{}", rendered.join("\n\n")))
    }
}

fn as_markdown(checklist: &Checklist) -> String {
    let items: Vec<String> = sorted_by_pos(&checklist.check_items)
        .into_iter()
        .map(|item| {
            let mark = if item.is_complete() { "x" } else { " " };
            format!("- [{mark}] {}", item.name)
        })
        .collect();
    format!("### {}\n\n{}", checklist.name, items.join("\n"))
}
