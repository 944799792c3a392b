//! Post models

use serde::{Deserialize, Serialize};

use super::RawContent;

/// Metadata shown in the post header and the index listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    /// Post title
    pub title: String,

    /// Display date as delivered by the content source
    pub date: String,

    /// Post tags, in source order
    #[serde(default)]
    pub tags: Vec<String>,

    /// Short summary shown under the title
    #[serde(default)]
    pub description: String,
}

/// A blog post as delivered by a content source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub metadata: PostMetadata,

    /// Unnormalized body; see [`super::normalize`]
    pub markdown: RawContent,

    /// Slug (URL-friendly name)
    pub slug: String,
}

impl BlogPost {
    pub fn new(slug: impl Into<String>, metadata: PostMetadata, markdown: RawContent) -> Self {
        Self {
            metadata,
            markdown,
            slug: slug.into(),
        }
    }

    /// Body collapsed to a single Markdown string
    pub fn markdown_body(&self) -> String {
        super::normalize(&self.markdown)
    }

    pub fn summary(&self) -> PostSummary {
        PostSummary {
            slug: self.slug.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A post without its body, used for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub slug: String,
    pub metadata: PostMetadata,
}

/// Title and description for the document head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
}

impl PageMetadata {
    pub const NOT_FOUND_TITLE: &'static str = "Post Not Found";
    pub const NOT_FOUND_DESCRIPTION: &'static str = "The requested blog post could not be found";

    /// Fixed metadata for a slug with no matching post
    pub fn not_found() -> Self {
        Self {
            title: Self::NOT_FOUND_TITLE.to_string(),
            description: Self::NOT_FOUND_DESCRIPTION.to_string(),
        }
    }
}

impl From<&PostMetadata> for PageMetadata {
    fn from(meta: &PostMetadata) -> Self {
        Self {
            title: meta.title.clone(),
            description: meta.description.clone(),
        }
    }
}
