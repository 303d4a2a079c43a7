use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::model::board::{Action, COMMENT_ACTION};
use crate::query::uploads::Upload;

const BASE: &str = "https://api.trello.com/1";

/// Read-only Trello client for what a board export leaves out.
pub struct TrelloSource {
    api_key: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CardActions {
    #[serde(default)]
    actions: Vec<Action>,
}

impl TrelloSource {
    pub fn new(api_key: String, token: String) -> Self {
        Self {
            api_key,
            token,
            client: reqwest::Client::new(),
        }
    }

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", &self.api_key), ("token", &self.token)]
    }

    /// Every comment on every card of the board, archived cards included.
    /// Exports cap actions, so comments are fetched per card instead.
    pub async fn fetch_comment_actions(&self, board_id: &str) -> Result<Vec<Action>> {
        let response = self
            .client
            .get(format!("{BASE}/boards/{board_id}/cards/all"))
            .query(&self.auth_params())
            .query(&[
                ("fields", "id"),
                ("actions", COMMENT_ACTION),
                ("actions_limit", "1000"),
            ])
            .send()
            .await
            .context("Trello boards/cards/all failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Trello returned {status} for board {board_id}: {body}");
        }

        let cards: Vec<CardActions> = response
            .json()
            .await
            .context("Failed to parse Trello card actions")?;
        let actions: Vec<Action> = cards
            .into_iter()
            .flat_map(|c| c.actions)
            .filter(|a| a.kind == COMMENT_ACTION)
            .collect();
        tracing::info!(board = board_id, comments = actions.len(), "fetched comments");
        Ok(actions)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
}

/// Fetch every upload into `dir/<key>`. Files already on disk are kept,
/// so an interrupted download can simply be rerun.
pub async fn download_uploads(client: &reqwest::Client, uploads: &[Upload], dir: &Path) -> Result<DownloadReport> {
    let mut report = DownloadReport::default();
    for upload in uploads {
        let path = dir.join(&upload.key);
        if path.exists() {
            tracing::debug!(key = %upload.key, "already downloaded");
            report.skipped += 1;
            continue;
        }

        let response = client
            .get(&upload.url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", upload.url))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Downloading {} returned {status}", upload.url);
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {}", upload.url))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // no truncated file under the final name
        let partial = path.with_extension("part");
        tokio::fs::write(&partial, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::info!(name = %upload.name, key = %upload.key, bytes = bytes.len(), "downloaded");
        report.downloaded += 1;
    }
    Ok(report)
}
