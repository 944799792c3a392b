//! notion-blog-rs: a server-rendered blog backed by a Notion database
//!
//! Posts are fetched by slug from a [`ContentSource`], their bodies are
//! normalized to Markdown and rendered with syntax-highlighted code blocks,
//! and the result is placed in embedded Tera page templates.

pub mod commands;
pub mod config;
pub mod content;
pub mod helpers;
pub mod server;
pub mod templates;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use config::SiteConfig;
use content::{
    BlogPost, ContentSource, HighlightError, Highlighter, MarkdownRenderer, PageMetadata,
    RenderedDocument, SourceError,
};
use templates::{page_context, PostData, TemplateRenderer};

pub use content::{MemorySource, NotionClient};

#[derive(Error, Debug)]
pub enum BlogError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Highlight(#[from] HighlightError),
}

/// The blog application: a content source plus the rendering pipeline
pub struct Blog<S> {
    /// Site configuration
    pub config: SiteConfig,
    source: S,
    renderer: MarkdownRenderer,
    templates: TemplateRenderer,
}

impl<S: ContentSource> Blog<S> {
    /// Create a new blog over a content source
    pub fn new(config: SiteConfig, source: S) -> Result<Self, BlogError> {
        let highlighter = Highlighter::new(&config.highlight.theme, config.highlight.line_numbers)?;
        let renderer = MarkdownRenderer::new(
            Arc::new(highlighter),
            Duration::from_millis(config.highlight.timeout_ms),
        );
        let templates = TemplateRenderer::new()?;

        Ok(Self {
            config,
            source,
            renderer,
            templates,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Normalize and render a post body
    pub async fn render_post(&self, post: &BlogPost) -> RenderedDocument {
        let markdown = post.markdown_body();
        self.renderer.render(&markdown).await
    }

    /// Full HTML page for a post, or `None` when no post has this slug
    pub async fn render_post_page(&self, slug: &str) -> Result<Option<String>, BlogError> {
        let Some(post) = self.source.fetch_post(slug).await? else {
            return Ok(None);
        };

        let document = self.render_post(&post).await;
        if document.degraded_blocks > 0 {
            tracing::info!(
                slug,
                degraded = document.degraded_blocks,
                "Some code blocks rendered without highlighting"
            );
        }

        let meta = PageMetadata::from(&post.metadata);
        let mut context = page_context(&self.config, Some(&meta));
        context.insert(
            "post",
            &PostData::new(&self.config, &post.summary(), document.html),
        );

        Ok(Some(self.templates.render("post.html", &context)?))
    }

    /// Title and description for a post page, independent of body rendering.
    ///
    /// Unknown slugs get the fixed not-found pair.
    pub async fn generate_metadata(&self, slug: &str) -> Result<PageMetadata, BlogError> {
        Ok(match self.source.fetch_post(slug).await? {
            Some(post) => PageMetadata::from(&post.metadata),
            None => PageMetadata::not_found(),
        })
    }

    /// Home page listing every post
    pub async fn render_index_page(&self) -> Result<String, BlogError> {
        let posts: Vec<PostData> = self
            .source
            .list_posts()
            .await?
            .iter()
            .map(|summary| PostData::new(&self.config, summary, String::new()))
            .collect();

        let mut context = page_context(&self.config, None);
        context.insert("posts", &posts);
        Ok(self.templates.render("index.html", &context)?)
    }

    pub fn render_not_found_page(&self) -> Result<String, BlogError> {
        let meta = PageMetadata::not_found();
        let mut context = page_context(&self.config, Some(&meta));
        context.insert("heading", &meta.title);
        Ok(self.templates.render("not_found.html", &context)?)
    }

    pub fn render_error_page(&self) -> Result<String, BlogError> {
        let context = page_context(&self.config, None);
        Ok(self.templates.render("error.html", &context)?)
    }
}
