use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::MigrationError;
use crate::query::AttachmentHost;
use crate::resolve::DEFAULT_CARD_URL_BASE;

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_LEDGER: &str = "progress.json";
const DEFAULT_LABEL_COLOR: &str = "ededed";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub github: Option<GitHubConfig>,
    pub trello: Option<TrelloConfig>,
    #[serde(default)]
    pub migration: MigrationConfig,
    /// Trello username -> GitHub login.
    #[serde(default)]
    pub members: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    pub project_id: Option<u64>,
    pub attachments_ref: Option<String>,
    pub token: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TrelloConfig {
    pub api_key: Option<String>,
    pub token: Option<String>,
    pub card_url_base: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MigrationConfig {
    pub ledger: Option<PathBuf>,
    #[serde(default)]
    pub paranoid: bool,
    pub default_label_color: Option<String>,
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trello2gh")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load the config at `path`, or the default location. A missing default
/// file yields an empty config; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path(), false),
    };
    if !path.exists() {
        if explicit {
            return Err(MigrationError::Configuration(format!(
                "config file {} does not exist",
                path.display()
            ))
            .into());
        }
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents)
        .map_err(|e| MigrationError::Configuration(format!("failed to parse config: {e}")).into())
}

fn env_or(value: &Option<String>, var: &str) -> Option<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
}

fn missing(what: &str) -> MigrationError {
    MigrationError::Configuration(format!("missing required setting {what}"))
}

impl AppConfig {
    pub fn github(&self) -> Result<&GitHubConfig, MigrationError> {
        let gh = self.github.as_ref().ok_or_else(|| missing("[github]"))?;
        if gh.owner.trim().is_empty() {
            return Err(missing("github.owner"));
        }
        if gh.repo.trim().is_empty() {
            return Err(missing("github.repo"));
        }
        Ok(gh)
    }

    pub fn project_id(&self) -> Result<u64, MigrationError> {
        self.github()?
            .project_id
            .filter(|id| *id > 0)
            .ok_or_else(|| missing("github.project_id"))
    }

    /// GitHub token from the config, falling back to `$GH_TOKEN`.
    pub fn github_token(&self) -> Result<String, MigrationError> {
        env_or(&self.github()?.token, "GH_TOKEN")
            .ok_or_else(|| missing("github.token (or $GH_TOKEN)"))
    }

    pub fn api_url(&self) -> Result<String, MigrationError> {
        Ok(self
            .github()?
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()))
    }

    pub fn attachment_host(&self) -> Result<AttachmentHost, MigrationError> {
        let gh = self.github()?;
        Ok(AttachmentHost {
            owner: gh.owner.clone(),
            repo: gh.repo.clone(),
            git_ref: gh
                .attachments_ref
                .clone()
                .unwrap_or_else(|| "main".to_string()),
        })
    }

    /// Trello key and token, falling back to `$TRELLO_APP` / `$TRELLO_TOKEN`.
    pub fn trello_credentials(&self) -> Result<(String, String), MigrationError> {
        let trello = self.trello.as_ref();
        let key = env_or(&trello.and_then(|t| t.api_key.clone()), "TRELLO_APP")
            .ok_or_else(|| missing("trello.api_key (or $TRELLO_APP)"))?;
        let token = env_or(&trello.and_then(|t| t.token.clone()), "TRELLO_TOKEN")
            .ok_or_else(|| missing("trello.token (or $TRELLO_TOKEN)"))?;
        Ok((key, token))
    }

    pub fn card_url_base(&self) -> &str {
        self.trello
            .as_ref()
            .and_then(|t| t.card_url_base.as_deref())
            .unwrap_or(DEFAULT_CARD_URL_BASE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.migration
            .ledger
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER))
    }

    pub fn default_label_color(&self) -> &str {
        self.migration
            .default_label_color
            .as_deref()
            .unwrap_or(DEFAULT_LABEL_COLOR)
    }
}
