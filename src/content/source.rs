//! Content sources - where posts come from

use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

use super::{BlogPost, PostSummary};

/// Failure talking to a content source.
///
/// A slug with no matching post is not an error; sources report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request to content source failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("content source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected content source response: {0}")]
    Schema(String),

    #[error("invalid JSON from content source: {0}")]
    Json(#[from] serde_json::Error),
}

/// A system of record for posts, addressed by slug
pub trait ContentSource: Send + Sync + 'static {
    /// Fetch one post. `Ok(None)` means no post has this slug.
    fn fetch_post(
        &self,
        slug: &str,
    ) -> impl Future<Output = Result<Option<BlogPost>, SourceError>> + Send;

    /// All visible posts, newest first
    fn list_posts(&self) -> impl Future<Output = Result<Vec<PostSummary>, SourceError>> + Send;
}

/// In-memory content source
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    posts: HashMap<String, BlogPost>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a post, replacing any post with the same slug
    pub fn insert(&mut self, post: BlogPost) {
        self.posts.insert(post.slug.clone(), post);
    }

    pub fn with_post(mut self, post: BlogPost) -> Self {
        self.insert(post);
        self
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

impl FromIterator<BlogPost> for MemorySource {
    fn from_iter<I: IntoIterator<Item = BlogPost>>(iter: I) -> Self {
        let mut source = MemorySource::new();
        for post in iter {
            source.insert(post);
        }
        source
    }
}

impl ContentSource for MemorySource {
    async fn fetch_post(&self, slug: &str) -> Result<Option<BlogPost>, SourceError> {
        Ok(self.posts.get(slug).cloned())
    }

    async fn list_posts(&self) -> Result<Vec<PostSummary>, SourceError> {
        let mut posts: Vec<PostSummary> = self.posts.values().map(BlogPost::summary).collect();
        posts.sort_by(|a, b| {
            b.metadata
                .date
                .cmp(&a.metadata.date)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        Ok(posts)
    }
}
