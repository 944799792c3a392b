//! CLI command implementations

pub mod list;
pub mod render;

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{NotionCredentials, SiteConfig};
use crate::content::{BlogPost, MemorySource, NotionClient};

/// Notion client from `NOTION_TOKEN` and `DATABASE_ID`
pub fn notion_source(config: &SiteConfig) -> Result<NotionClient> {
    let credentials = NotionCredentials::from_env()?;
    tracing::debug!("Using Notion database {}", credentials.database_id);
    Ok(NotionClient::new(config.notion.clone(), credentials)?)
}

/// Load posts from a JSON file holding an array of posts
pub fn load_posts_file(path: &Path) -> Result<MemorySource> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read posts file {:?}", path))?;
    let posts: Vec<BlogPost> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse posts file {:?}", path))?;

    tracing::info!("Loaded {} posts from {:?}", posts.len(), path);
    Ok(posts.into_iter().collect())
}
