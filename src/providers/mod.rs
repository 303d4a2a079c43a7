pub mod github;
pub mod trello;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Status and decoded body of a target API call. Non-2xx responses are
/// returned as data; the caller decides what a failure means.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The calls the migration makes against the target system. `resource`
/// is a path relative to the API root, as built by [`Routes`].
#[async_trait]
pub trait TargetApi: Send + Sync {
    async fn create(&self, resource: &str, payload: Value) -> Result<ApiResponse>;
    async fn update(&self, resource: &str, payload: Value) -> Result<ApiResponse>;
    async fn list(&self, resource: &str) -> Result<ApiResponse>;
    async fn delete(&self, resource: &str) -> Result<ApiResponse>;
}

/// Resource paths for one repository and its classic project board.
#[derive(Debug, Clone)]
pub struct Routes {
    owner: String,
    repo: String,
    project_id: u64,
}

impl Routes {
    pub fn new(owner: &str, repo: &str, project_id: u64) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            project_id,
        }
    }

    pub fn columns(&self) -> String {
        format!("/projects/{}/columns", self.project_id)
    }

    pub fn column(&self, column_id: u64) -> String {
        format!("/projects/columns/{column_id}")
    }

    pub fn column_cards(&self, column_id: u64) -> String {
        format!("/projects/columns/{column_id}/cards")
    }

    pub fn project_card(&self, card_id: u64) -> String {
        format!("/projects/columns/cards/{card_id}")
    }

    pub fn labels(&self) -> String {
        format!("/repos/{}/{}/labels", self.owner, self.repo)
    }

    pub fn label(&self, name: &str) -> String {
        format!("{}/{}", self.labels(), urlencoding::encode(name))
    }

    pub fn issues(&self) -> String {
        format!("/repos/{}/{}/issues", self.owner, self.repo)
    }

    pub fn issue(&self, number: u64) -> String {
        format!("{}/{number}", self.issues())
    }

    pub fn issue_comments(&self, number: u64) -> String {
        format!("{}/comments", self.issue(number))
    }
}
