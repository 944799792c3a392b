//! Page templates using the Tera template engine
//!
//! All templates are embedded directly in the binary.

use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{PageMetadata, PostSummary};
use crate::helpers::{date_xml, display_date, html_escape, post_url, truncate, url_for};

/// Date format used on rendered pages
const DISPLAY_DATE_FORMAT: &str = "%B %d, %Y";

/// Template renderer with the embedded blog theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> tera::Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("blog/layout.html")),
            ("index.html", include_str!("blog/index.html")),
            ("post.html", include_str!("blog/post.html")),
            ("not_found.html", include_str!("blog/not_found.html")),
            ("error.html", include_str!("blog/error.html")),
            // Partials
            ("partials/nav.html", include_str!("blog/partials/nav.html")),
            ("partials/style.css", include_str!("blog/partials/style.css")),
        ])?;

        // Tera's default escaper also rewrites `/`, which mangles hrefs
        tera.set_escape_fn(html_escape);

        tera.register_filter("truncate_chars", truncate_chars_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> tera::Result<String> {
        self.tera.render(template_name, context)
    }
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "...".to_string(),
    };

    Ok(tera::Value::String(truncate(&s, length, Some(&omission))))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub language: String,
    pub root: String,
    pub menu: Vec<MenuData>,
}

impl SiteData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            language: config.language.clone(),
            root: url_for(config, "/"),
            menu: config
                .menu
                .iter()
                .map(|item| MenuData {
                    name: item.name.clone(),
                    url: url_for(config, &item.path),
                    external: item.path.starts_with("http://")
                        || item.path.starts_with("https://"),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MenuData {
    pub name: String,
    pub url: String,
    pub external: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub slug: String,
    pub url: String,
    pub title: String,
    /// Human-readable date
    pub date: String,
    /// Value for `<time datetime>`
    pub datetime: String,
    pub tags: Vec<String>,
    pub description: String,
    /// Rendered body HTML; empty in listings
    pub content: String,
}

impl PostData {
    pub fn new(config: &SiteConfig, summary: &PostSummary, content: String) -> Self {
        let meta = &summary.metadata;
        Self {
            slug: summary.slug.clone(),
            url: post_url(config, &summary.slug),
            title: meta.title.clone(),
            date: display_date(&meta.date, DISPLAY_DATE_FORMAT),
            datetime: date_xml(&meta.date),
            tags: meta.tags.clone(),
            description: meta.description.clone(),
            content,
        }
    }
}

/// Base context shared by every page
pub fn page_context(config: &SiteConfig, meta: Option<&PageMetadata>) -> Context {
    let mut context = Context::new();
    context.insert("site", &SiteData::from_config(config));
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context.insert(
        "page_title",
        &config.page_title(meta.map(|m| m.title.as_str())),
    );
    context.insert(
        "page_description",
        meta.map(|m| m.description.as_str())
            .unwrap_or(&config.description),
    );
    context
}
