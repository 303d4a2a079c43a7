use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::Positioned;
use crate::error::MigrationError;

/// A Trello board export, reduced to the entity kinds the migration uses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lists: Vec<List>,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub checklists: Vec<Checklist>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    pub name: String,
    pub pos: f64,
    #[serde(default)]
    pub closed: bool,
    pub id_board: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub id_short: u64,
    pub short_link: String,
    pub short_url: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub id_list: String,
    pub id_board: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub id_members: Vec<String>,
    #[serde(default)]
    pub id_checklists: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub pos: f64,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub color: Option<String>,
    pub id_board: Option<String>,
}

impl Label {
    /// Colour-only labels have no name in Trello; fall back to the colour.
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            &self.name
        } else {
            self.color.as_deref().unwrap_or("unnamed")
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id: String,
    pub name: String,
    pub pos: f64,
    #[serde(default)]
    pub check_items: Vec<CheckItem>,
    pub id_board: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckItem {
    pub name: String,
    pub state: String,
    pub pos: f64,
}

impl CheckItem {
    pub fn is_complete(&self) -> bool {
        self.state == "complete"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub is_upload: bool,
    pub pos: f64,
}

/// Raw Trello action. Only `commentCard` actions are kept, as [`Comment`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    pub id_member_creator: String,
    #[serde(default)]
    pub data: ActionData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionData {
    pub text: Option<String>,
    pub card: Option<CardRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRef {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub card_id: String,
    pub author_id: String,
    pub date: DateTime<Utc>,
    pub text: String,
}

pub const COMMENT_ACTION: &str = "commentCard";

impl Comment {
    fn from_action(action: &Action) -> std::result::Result<Self, MigrationError> {
        let card_id = action
            .data
            .card
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or_else(|| {
                MigrationError::InvalidSnapshot(format!("comment {} has no card", action.id))
            })?;
        let text = action.data.text.clone().ok_or_else(|| {
            MigrationError::InvalidSnapshot(format!("comment {} has no text", action.id))
        })?;
        Ok(Self {
            id: action.id.clone(),
            card_id,
            author_id: action.id_member_creator.clone(),
            date: action.date,
            text,
        })
    }
}

impl Positioned for List {
    fn pos(&self) -> f64 {
        self.pos
    }
}

impl Positioned for Card {
    fn pos(&self) -> f64 {
        self.pos
    }
}

impl Positioned for Checklist {
    fn pos(&self) -> f64 {
        self.pos
    }
}

impl Positioned for CheckItem {
    fn pos(&self) -> f64 {
        self.pos
    }
}

impl Positioned for Attachment {
    fn pos(&self) -> f64 {
        self.pos
    }
}

impl Board {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read board export {}", path.display()))?;
        let board = Self::from_json(&contents)
            .with_context(|| format!("Failed to load board export {}", path.display()))?;
        Ok(board)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let board: Board = serde_json::from_str(json.trim()).context("Failed to parse board JSON")?;
        board.validate()?;
        Ok(board)
    }

    /// Replace the board's comment actions with a separately fetched set.
    pub fn with_comment_actions(mut self, actions: Vec<Action>) -> Result<Self> {
        self.actions.retain(|a| a.kind != COMMENT_ACTION);
        self.actions.extend(actions);
        self.validate()?;
        Ok(self)
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.actions
            .iter()
            .filter(|a| a.kind == COMMENT_ACTION)
            .filter_map(|a| Comment::from_action(a).ok())
            .collect()
    }

    fn validate(&self) -> std::result::Result<(), MigrationError> {
        let list_ids: HashSet<&str> = self.lists.iter().map(|l| l.id.as_str()).collect();
        let checklist_ids: HashSet<&str> = self.checklists.iter().map(|c| c.id.as_str()).collect();
        let mut numbers = HashSet::new();
        let mut short_links = HashSet::new();

        for card in &self.cards {
            if !list_ids.contains(card.id_list.as_str()) {
                return Err(MigrationError::InvalidSnapshot(format!(
                    "card {} refers to unknown list {}",
                    card.id, card.id_list
                )));
            }
            if let Some(missing) = card
                .id_checklists
                .iter()
                .find(|id| !checklist_ids.contains(id.as_str()))
            {
                return Err(MigrationError::InvalidSnapshot(format!(
                    "card {} refers to unknown checklist {missing}",
                    card.id
                )));
            }
            if !numbers.insert(card.id_short) {
                return Err(MigrationError::InvalidSnapshot(format!(
                    "card number #{} is used more than once",
                    card.id_short
                )));
            }
            if !short_links.insert(card.short_link.as_str()) {
                return Err(MigrationError::InvalidSnapshot(format!(
                    "short link {} is used more than once",
                    card.short_link
                )));
            }
        }

        for action in self.actions.iter().filter(|a| a.kind == COMMENT_ACTION) {
            Comment::from_action(action)?;
        }
        Ok(())
    }
}
