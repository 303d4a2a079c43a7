use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::model::board::Card;

/// Directory in the target repository that holds uploaded attachments.
pub const UPLOADS_DIR: &str = ".github/trello-attachments";

/// Where uploaded attachments are served from once committed.
#[derive(Debug, Clone)]
pub struct AttachmentHost {
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
}

impl AttachmentHost {
    fn url_for(&self, key: &str) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{UPLOADS_DIR}/{key}",
            self.owner, self.repo, self.git_ref
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub url: String,
    /// `sha256(url)/basename(url)`, stable across runs.
    pub key: String,
}

/// Every attachment Trello stores itself, indexed by its source URL.
pub struct UploadIndex {
    host: AttachmentHost,
    uploads: Vec<Upload>,
    by_url: HashMap<String, usize>,
}

impl UploadIndex {
    pub fn new(cards: &[Card], host: AttachmentHost) -> Self {
        let mut index = Self {
            host,
            uploads: Vec::new(),
            by_url: HashMap::new(),
        };
        for attachment in cards.iter().flat_map(|c| &c.attachments).filter(|a| a.is_upload) {
            if index.by_url.contains_key(&attachment.url) {
                continue;
            }
            index.by_url.insert(attachment.url.clone(), index.uploads.len());
            index.uploads.push(Upload {
                name: attachment.name.clone(),
                url: attachment.url.clone(),
                key: storage_key(&attachment.url),
            });
        }
        index
    }

    pub fn uploads(&self) -> &[Upload] {
        &self.uploads
    }

    pub fn get(&self, url: &str) -> Option<&Upload> {
        self.by_url.get(url).map(|i| &self.uploads[*i])
    }

    /// Target location of an uploaded attachment. Unknown URLs are left
    /// as they are.
    pub fn remap(&self, url: &str) -> String {
        match self.get(url) {
            Some(upload) => self.host.url_for(&upload.key),
            None => {
                tracing::warn!(url, "could not map attachment url");
                url.to_string()
            }
        }
    }
}

pub fn storage_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("{:x}/{}", digest, basename(url))
}

fn basename(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}
