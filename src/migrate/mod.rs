//! Stage-ordered migration of a board snapshot onto the target.
//!
//! Every remote call goes through [`Ledger::track`], one at a time, so a
//! rerun after any failure skips what is done and resumes where it stopped.

pub mod destroy;
pub mod sanity;

use anyhow::{Context, Result};
use serde_json::json;
use std::fmt;

use crate::ledger::Ledger;
use crate::model::board::{Board, Card, Label};
use crate::model::sorted_by_pos;
use crate::providers::{Routes, TargetApi};
use crate::query::Indexes;
use crate::render::{render_comment, render_description, render_resolved_description};

pub const LISTS: &str = "lists";
pub const LABELS: &str = "labels";
pub const CARDS: &str = "cards";
pub const CARD_NUMBERS: &str = "cards.number";
pub const CARD_STATE: &str = "cards.state";
pub const COMMENTS: &str = "comments";
pub const PROJECT_CARDS: &str = "project-cards";
pub const PROJECT_CARD_STATE: &str = "project-cards.state";

/// Trello label colours and their GitHub hex equivalents.
const PALETTE: &[(&str, &str)] = &[
    ("black", "708090"),
    ("blue", "4169E1"),
    ("green", "32CD32"),
    ("lime", "00FA9A"),
    ("orange", "FF8C00"),
    ("pink", "FF69B4"),
    ("purple", "EE82EE"),
    ("red", "DC143C"),
    ("sky", "AFEEEE"),
    ("yellow", "FFD700"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lists,
    Labels,
    Cards,
    CardBodies,
    Comments,
    ProjectCards,
    CardArchive,
}

impl Stage {
    /// Dependency order: each stage reads ledger entries of the ones before it.
    pub const ALL: [Stage; 7] = [
        Stage::Lists,
        Stage::Labels,
        Stage::Cards,
        Stage::CardBodies,
        Stage::Comments,
        Stage::ProjectCards,
        Stage::CardArchive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Lists => "lists",
            Stage::Labels => "labels",
            Stage::Cards => "cards",
            Stage::CardBodies => "card-bodies",
            Stage::Comments => "comments",
            Stage::ProjectCards => "project-cards",
            Stage::CardArchive => "card-archive",
        }
    }

    pub fn parse(name: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn label_color(color: Option<&str>, default: &str) -> String {
    color
        .and_then(|c| PALETTE.iter().find(|(name, _)| *name == c))
        .map(|(_, hex)| hex.to_string())
        .unwrap_or_else(|| default.to_string())
}

pub struct Migrator<'a> {
    board: &'a Board,
    ix: &'a Indexes<'a>,
    api: &'a dyn TargetApi,
    routes: Routes,
    ledger: &'a mut Ledger,
    default_label_color: String,
}

impl<'a> Migrator<'a> {
    pub fn new(
        board: &'a Board,
        ix: &'a Indexes<'a>,
        api: &'a dyn TargetApi,
        routes: Routes,
        ledger: &'a mut Ledger,
    ) -> Self {
        Self {
            board,
            ix,
            api,
            routes,
            ledger,
            default_label_color: "ededed".to_string(),
        }
    }

    pub fn with_default_label_color(mut self, color: &str) -> Self {
        self.default_label_color = color.to_string();
        self
    }

    /// Run `stages` in order. The ledger is flushed after every stage,
    /// including the one that failed.
    pub async fn run(&mut self, stages: &[Stage]) -> Result<()> {
        for stage in stages {
            tracing::info!(%stage, "migrating");
            let outcome = self.run_stage(*stage).await;

            if let Err(e) = self.ledger.flush() {
                if outcome.is_ok() {
                    return Err(e);
                }
                tracing::error!(error = %e, "failed to flush ledger");
            }
            outcome.with_context(|| format!("stage {stage} failed"))?;
            tracing::info!(%stage, "migrated");
        }
        Ok(())
    }

    async fn run_stage(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Lists => self.lists().await,
            Stage::Labels => self.labels().await,
            Stage::Cards => self.cards().await,
            Stage::CardBodies => self.card_bodies().await,
            Stage::Comments => self.comments().await,
            Stage::ProjectCards => self.project_cards().await,
            Stage::CardArchive => self.card_archive().await,
        }
    }

    async fn lists(&mut self) -> Result<()> {
        let api = self.api;
        let path = self.routes.columns();
        for list in sorted_by_pos(&self.board.lists) {
            let payload = json!({ "name": list.name });
            self.ledger
                .track(LISTS, &list.id, &[], || api.create(&path, payload))
                .await?;
        }
        Ok(())
    }

    async fn labels(&mut self) -> Result<()> {
        let api = self.api;
        let path = self.routes.labels();
        for label in &self.board.labels {
            let payload = json!({
                "name": label.display_name(),
                "color": label_color(label.color.as_deref(), &self.default_label_color),
            });
            self.ledger
                .track(LABELS, &label.id, &[], || api.create(&path, payload))
                .await?;
        }
        Ok(())
    }

    async fn cards(&mut self) -> Result<()> {
        let api = self.api;
        let path = self.routes.issues();
        for card in self.ix.cards.in_number_order() {
            if self.ledger.is_done(CARDS, &card.id) {
                tracing::debug!(card = %card.id, "nothing to do");
                continue;
            }
            let payload = self.issue_payload(card)?;
            self.ledger
                .track(CARDS, &card.id, &["number"], || api.create(&path, payload))
                .await?;
        }
        Ok(())
    }

    fn issue_payload(&self, card: &Card) -> Result<serde_json::Value> {
        let body = render_description(card, self.ix)
            .with_context(|| format!("Failed to render card {} (#{})", card.id, card.id_short))?;
        let labels: Vec<&str> = card.labels.iter().map(Label::display_name).collect();
        let assignees: Vec<&str> = card
            .id_members
            .iter()
            .filter_map(|id| self.ix.members.login_for(id))
            .collect();
        Ok(json!({
            "title": card.name,
            "body": body,
            "labels": labels,
            "assignees": assignees,
        }))
    }

    /// Fail before touching the target unless every card already has an
    /// entry under `category`.
    fn require_every_card(&self, category: &str) -> Result<()> {
        for card in self.ix.cards.in_number_order() {
            self.ledger.github_id_or_fail(category, &card.id)?;
        }
        Ok(())
    }

    async fn card_bodies(&mut self) -> Result<()> {
        self.require_every_card(CARD_NUMBERS)?;
        let api = self.api;
        for card in self.ix.cards.in_number_order() {
            if self.ledger.is_done(CARD_STATE, &card.id) {
                continue;
            }
            let number = self.ledger.github_id_or_fail(CARD_NUMBERS, &card.id)?;
            let body = render_resolved_description(card, self.ix, self.ledger)
                .with_context(|| format!("Failed to render card {} (#{})", card.id, card.id_short))?;
            let payload = json!({
                "body": body,
                "state": if card.closed { "closed" } else { "open" },
            });
            let path = self.routes.issue(number);
            self.ledger
                .track(CARD_STATE, &card.id, &[], || api.update(&path, payload))
                .await?;
        }
        Ok(())
    }

    async fn comments(&mut self) -> Result<()> {
        self.require_every_card(CARD_NUMBERS)?;
        let api = self.api;
        for card in self.ix.cards.in_number_order() {
            let comments = self.ix.comments.for_card(card);
            if comments.iter().all(|c| self.ledger.is_done(COMMENTS, &c.id)) {
                continue;
            }
            let number = self.ledger.github_id_or_fail(CARD_NUMBERS, &card.id)?;
            let path = self.routes.issue_comments(number);

            for comment in comments {
                if self.ledger.is_done(COMMENTS, &comment.id) {
                    continue;
                }
                let body = render_comment(comment, self.ix, self.ledger)
                    .with_context(|| format!("Failed to render comment {} on card {}", comment.id, card.id))?;
                let payload = json!({ "body": body });
                self.ledger
                    .track(COMMENTS, &comment.id, &[], || api.create(&path, payload))
                    .await?;
            }
        }
        Ok(())
    }

    async fn project_cards(&mut self) -> Result<()> {
        let api = self.api;
        for list in sorted_by_pos(&self.board.lists) {
            let mut cards: Vec<&Card> = sorted_by_pos(&self.board.cards)
                .into_iter()
                .filter(|c| c.id_list == list.id)
                .collect();
            // new cards land on top of the column
            cards.reverse();
            if cards.iter().all(|c| self.ledger.is_done(PROJECT_CARDS, &c.id)) {
                continue;
            }

            let column = self.ledger.github_id_or_fail(LISTS, &list.id)?;
            let path = self.routes.column_cards(column);
            for card in cards {
                if self.ledger.is_done(PROJECT_CARDS, &card.id) {
                    continue;
                }
                let issue = self.ledger.github_id_or_fail(CARDS, &card.id)?;
                let payload = json!({ "content_id": issue, "content_type": "Issue" });
                self.ledger
                    .track(PROJECT_CARDS, &card.id, &[], || api.create(&path, payload))
                    .await?;
            }
        }
        Ok(())
    }

    async fn card_archive(&mut self) -> Result<()> {
        let api = self.api;
        for card in self.ix.cards.in_number_order().into_iter().filter(|c| c.closed) {
            if self.ledger.is_done(PROJECT_CARD_STATE, &card.id) {
                continue;
            }
            let project_card = self.ledger.github_id_or_fail(PROJECT_CARDS, &card.id)?;
            let path = self.routes.project_card(project_card);
            let payload = json!({ "archived": true });
            self.ledger
                .track(PROJECT_CARD_STATE, &card.id, &[], || api.update(&path, payload))
                .await?;
        }
        Ok(())
    }
}

/// Counts logged before a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub lists: usize,
    pub labels: usize,
    pub cards: usize,
    pub cards_with_attachments: usize,
    pub cards_linking_cards: usize,
    pub checklists: usize,
    pub members: usize,
    pub mapped_members: usize,
    pub comments: usize,
}

impl Stats {
    pub fn collect(board: &Board, ix: &Indexes) -> Self {
        Self {
            lists: board.lists.len(),
            labels: board.labels.len(),
            cards: ix.cards.len(),
            cards_with_attachments: board.cards.iter().filter(|c| ix.cards.has_attachments(c)).count(),
            cards_linking_cards: board
                .cards
                .iter()
                .filter(|c| ix.cards.has_card_attachments(c))
                .count(),
            checklists: board.checklists.len(),
            members: board.members.len(),
            mapped_members: ix.members.len(),
            comments: ix.comments.len(),
        }
    }

    pub fn log(&self) {
        tracing::info!(
            lists = self.lists,
            labels = self.labels,
            cards = self.cards,
            cards_with_attachments = self.cards_with_attachments,
            cards_linking_cards = self.cards_linking_cards,
            checklists = self.checklists,
            members = self.members,
            mapped_members = self.mapped_members,
            comments = self.comments,
            "board statistics"
        );
    }
}

#[cfg(test)]
mod tests;
