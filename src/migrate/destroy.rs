use anyhow::{bail, Result};
use serde_json::Value;
use std::fmt;
use std::io::{BufRead, Write};

use super::PROJECT_CARDS;
use crate::ledger::Ledger;
use crate::providers::{Routes, TargetApi};

const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyKind {
    Lists,
    Labels,
    Cards,
}

impl DestroyKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lists" => Some(Self::Lists),
            "labels" => Some(Self::Labels),
            "cards" => Some(Self::Cards),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Lists => "lists",
            Self::Labels => "labels",
            Self::Cards => "cards",
        }
    }
}

impl fmt::Display for DestroyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ask for the exact phrase `delete all <kind>`. Anything else is a no.
pub fn confirm<R: BufRead, W: Write>(kind: DestroyKind, input: &mut R, output: &mut W) -> Result<bool> {
    let phrase = format!("delete all {kind}");
    write!(
        output,
        "Are you sure you want to delete all {kind}? (confirm by typing: {phrase}) "
    )?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == phrase)
}

/// Delete every target object of `kind`. Returns how many were deleted.
pub async fn destroy(kind: DestroyKind, api: &dyn TargetApi, routes: &Routes, ledger: &Ledger) -> Result<usize> {
    let resources: Vec<String> = match kind {
        DestroyKind::Lists => list_all(api, &routes.columns())
            .await?
            .iter()
            .filter_map(|c| c["id"].as_u64())
            .map(|id| routes.column(id))
            .collect(),
        DestroyKind::Labels => list_all(api, &routes.labels())
            .await?
            .iter()
            .filter_map(|l| l["name"].as_str())
            .map(|name| routes.label(name))
            .collect(),
        DestroyKind::Cards => ledger
            .source_ids(PROJECT_CARDS)
            .into_iter()
            .filter_map(|id| ledger.github_id(PROJECT_CARDS, id))
            .map(|id| routes.project_card(id))
            .collect(),
    };

    tracing::info!(%kind, count = resources.len(), "deleting");
    for resource in &resources {
        let response = api.delete(resource).await?;
        // already gone is as good as deleted
        if !response.is_success() && response.status != 404 {
            bail!("deleting {resource} failed with status {}: {}", response.status, response.body);
        }
        tracing::debug!(resource, "deleted");
    }
    Ok(resources.len())
}

async fn list_all(api: &dyn TargetApi, resource: &str) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    for page in 1.. {
        let response = api
            .list(&format!("{resource}?per_page={PAGE_SIZE}&page={page}"))
            .await?;
        if !response.is_success() {
            bail!("listing {resource} failed with status {}: {}", response.status, response.body);
        }
        let batch = match response.body {
            Value::Array(batch) => batch,
            other => bail!("listing {resource} returned a non-array body: {other}"),
        };
        let last = batch.len() < PAGE_SIZE;
        items.extend(batch);
        if last {
            break;
        }
    }
    Ok(items)
}
