//! Rewriting of cross references inside rendered text.
//!
//! Mentions and numeric tags only need the snapshot. Card links need the
//! ledger, so they resolve on the second pass once target issues exist.

use anyhow::Result;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::MigrationError;
use crate::ledger::Ledger;
use crate::query::{CardIndex, MemberIndex};

pub const DEFAULT_CARD_URL_BASE: &str = "https://trello.com";

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\W)@([\w-]+)").expect("valid mention regex"));

// Either an absolute URL (left alone) or a bare `#NNN` tag. Regex has no
// lookbehind, so a tag inside a URL is skipped by matching the whole URL.
static CARD_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://[\w/?&%.#+=\-]+)|#(\d+)\b").expect("valid card tag regex")
});

static TARGET_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhttps://github\.com/\w+/\w+/(?:pull|issues)/\d+")
        .expect("valid target object regex")
});

/// Replace `@username` with `@login` where the username has a mapping.
pub fn replace_mentions(text: &str, members: &MemberIndex) -> String {
    MENTION_RE
        .replace_all(text, |caps: &Captures| {
            let username = &caps[2];
            let login = members.login_for_username(username).unwrap_or(username);
            format!("{}@{login}", &caps[1])
        })
        .into_owned()
}

/// Pin bare `#NNN` tags to the absolute URL of source card NNN, so they
/// cannot collide with target issue numbers. A tag naming no card is an
/// error the operator has to fix in the data.
pub fn pin_card_numbers(text: &str, cards: &CardIndex) -> Result<String, MigrationError> {
    let mut failure = None;
    let pinned = CARD_TAG_RE.replace_all(text, |caps: &Captures| {
        if let Some(url) = caps.get(1) {
            return url.as_str().to_string();
        }
        match cards.url_by_number(&caps[2]) {
            Ok(url) => url.to_string(),
            Err(e) => {
                failure.get_or_insert(e);
                caps[0].to_string()
            }
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(pinned.into_owned()),
    }
}

/// Recognises links to source cards and target issues.
#[derive(Debug, Clone)]
pub struct SourceLinks {
    card_link_re: Regex,
}

impl Default for SourceLinks {
    fn default() -> Self {
        Self::new(DEFAULT_CARD_URL_BASE).expect("default card url base is a valid pattern")
    }
}

impl SourceLinks {
    pub fn new(card_url_base: &str) -> Result<Self> {
        let base = regex::escape(card_url_base.trim_end_matches('/'));
        let card_link_re = Regex::new(&format!(r"(?i)\b({base}/c/([a-z0-9]{{8}})(?:/[\w/?&%.\-=]*)?)"))?;
        Ok(Self { card_link_re })
    }

    pub fn is_source_card(&self, url: &str) -> bool {
        self.card_link_re.is_match(url)
    }

    pub fn is_target_object(&self, url: &str) -> bool {
        TARGET_OBJECT_RE.is_match(url)
    }

    /// Rewrite source card links to `#<issue number>` for every card the
    /// ledger already knows. Links that cannot be resolved yet stay as
    /// they are and are reported.
    pub fn remap_to_target(&self, text: &str, cards: &CardIndex, ledger: &Ledger) -> String {
        let (remapped, unresolved) = self.remap_links(text, cards, ledger);
        for short_link in &unresolved {
            tracing::warn!(%short_link, "link was not resolved to a target issue");
        }
        remapped
    }

    /// Like [`remap_to_target`](Self::remap_to_target), also returning the
    /// short links of board cards that have no issue number yet.
    fn remap_links(&self, text: &str, cards: &CardIndex, ledger: &Ledger) -> (String, Vec<String>) {
        let mut unresolved = Vec::new();
        let remapped = self
            .card_link_re
            .replace_all(text, |caps: &Captures| {
                let url = &caps[1];
                let short_link = &caps[2];
                let Some(card) = cards.by_short_link(short_link) else {
                    tracing::debug!(url, "link points outside this board");
                    return url.to_string();
                };
                match ledger.github_id("cards.number", &card.id) {
                    Some(number) => format!("#{number}"),
                    None => {
                        unresolved.push(short_link.to_string());
                        url.to_string()
                    }
                }
            })
            .into_owned();
        (remapped, unresolved)
    }
}
