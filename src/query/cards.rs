use std::collections::{HashMap, HashSet};

use crate::error::MigrationError;
use crate::model::board::Card;
use crate::resolve::SourceLinks;

/// Lookups over every card of the board.
pub struct CardIndex<'a> {
    cards: Vec<&'a Card>,
    by_id: HashMap<&'a str, &'a Card>,
    by_short_link: HashMap<&'a str, &'a Card>,
    by_number: HashMap<u64, &'a Card>,
    with_attachments: HashSet<&'a str>,
    with_card_attachments: HashSet<&'a str>,
}

impl<'a> CardIndex<'a> {
    pub fn new(cards: &'a [Card], links: &SourceLinks) -> Self {
        let mut index = Self {
            cards: Vec::with_capacity(cards.len()),
            by_id: HashMap::new(),
            by_short_link: HashMap::new(),
            by_number: HashMap::new(),
            with_attachments: HashSet::new(),
            with_card_attachments: HashSet::new(),
        };

        for card in cards {
            index.cards.push(card);
            index.by_id.insert(card.id.as_str(), card);
            index.by_short_link.insert(card.short_link.as_str(), card);
            index.by_number.insert(card.id_short, card);
            if !card.attachments.is_empty() {
                index.with_attachments.insert(card.id.as_str());
            }
            if card.attachments.iter().any(|a| links.is_source_card(&a.url)) {
                index.with_card_attachments.insert(card.id.as_str());
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn get(&self, id: &str) -> Option<&'a Card> {
        self.by_id.get(id).copied()
    }

    pub fn by_short_link(&self, short_link: &str) -> Option<&'a Card> {
        self.by_short_link.get(short_link).copied()
    }

    pub fn by_number(&self, number: u64) -> Option<&'a Card> {
        self.by_number.get(&number).copied()
    }

    /// Canonical URL of the card with Trello short number `number`.
    pub fn url_by_number(&self, number: &str) -> Result<&'a str, MigrationError> {
        number
            .parse::<u64>()
            .ok()
            .and_then(|n| self.by_number(n))
            .map(|c| c.short_url.as_str())
            .ok_or_else(|| MigrationError::UnknownCardNumber(number.to_string()))
    }

    pub fn has_attachments(&self, card: &Card) -> bool {
        self.with_attachments.contains(card.id.as_str())
    }

    /// Whether any attachment of `card` links to another source card.
    pub fn has_card_attachments(&self, card: &Card) -> bool {
        self.with_card_attachments.contains(card.id.as_str())
    }

    /// Cards in migration order: ascending short number.
    pub fn in_number_order(&self) -> Vec<&'a Card> {
        let mut cards = self.cards.clone();
        cards.sort_by_key(|c| c.id_short);
        cards
    }
}
