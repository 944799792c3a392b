//! Notion content source
//!
//! Posts live as pages in a Notion database. Page properties carry the post
//! metadata; the page's blocks are converted to Markdown and handed over
//! wrapped as `{"parent": markdown}`.

use futures::future::BoxFuture;
use futures::FutureExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::source::{ContentSource, SourceError};
use super::{BlogPost, PostMetadata, PostSummary, RawContent};
use crate::config::{NotionConfig, NotionCredentials};

/// Largest page size the Notion API accepts
const PAGE_SIZE: u32 = 100;

/// Characters escaped in ids and cursors placed in URLs
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Longest error body kept in [`SourceError::Status`]
const MAX_ERROR_BODY: usize = 512;

/// Paginated list envelope used by query and block endpoints
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    results: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// A database row
#[derive(Debug, Clone, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A content block. The payload lives under the key named by `kind`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotionBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl NotionBlock {
    fn payload(&self) -> &Value {
        self.data.get(&self.kind).unwrap_or(&Value::Null)
    }
}

/// A block with its children already fetched
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub block: NotionBlock,
    pub children: Vec<BlockNode>,
}

/// Client for a single Notion database
pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
    credentials: NotionCredentials,
}

impl NotionClient {
    pub fn new(config: NotionConfig, credentials: NotionCredentials) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        let version = HeaderValue::from_str(&config.version)
            .map_err(|_| SourceError::Schema(format!("invalid Notion-Version {:?}", config.version)))?;
        headers.insert("Notion-Version", version);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("notion-blog-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Decode a response body, turning non-2xx statuses into errors
    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SourceError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn query_database(&self, body: &Value) -> Result<ListResponse<NotionPage>, SourceError> {
        let url = self.api_url(&format!("databases/{}/query", self.credentials.database_id));
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.credentials.token)
            .json(body)
            .send()
            .await?;

        Self::read_json(response).await
    }

    /// All direct children of a block, following pagination
    async fn block_children(&self, block_id: &str) -> Result<Vec<NotionBlock>, SourceError> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = self.api_url(&format!(
                "blocks/{}/children?page_size={}",
                utf8_percent_encode(block_id, URL_COMPONENT),
                PAGE_SIZE
            ));
            if let Some(cursor) = &cursor {
                url.push_str("&start_cursor=");
                url.push_str(&utf8_percent_encode(cursor, URL_COMPONENT).to_string());
            }
            tracing::debug!("GET {}", url);

            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.credentials.token)
                .send()
                .await?;
            let page: ListResponse<NotionBlock> = Self::read_json(response).await?;
            blocks.extend(page.results);

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    /// Fetch a block subtree
    fn block_tree<'a>(&'a self, block_id: &'a str) -> BoxFuture<'a, Result<Vec<BlockNode>, SourceError>> {
        async move {
            let blocks = self.block_children(block_id).await?;
            let mut nodes = Vec::with_capacity(blocks.len());
            for block in blocks {
                let children = if block.has_children && block.kind != "child_page" {
                    self.block_tree(&block.id).await?
                } else {
                    Vec::new()
                };
                nodes.push(BlockNode { block, children });
            }
            Ok(nodes)
        }
        .boxed()
    }

    fn published_filter(&self) -> Option<Value> {
        self.config
            .published_property
            .as_ref()
            .map(|property| json!({"property": property, "checkbox": {"equals": true}}))
    }

    fn with_published(&self, filter: Value) -> Value {
        match self.published_filter() {
            Some(published) => json!({"and": [filter, published]}),
            None => filter,
        }
    }

    fn slug_query(&self, slug: &str) -> Value {
        let filter = self.with_published(json!({
            "property": self.config.slug_property,
            "rich_text": {"equals": slug},
        }));
        json!({"filter": filter, "page_size": 1})
    }

    /// Pages whose slug property is blank; their slug comes from the title
    fn blank_slug_query(&self, cursor: Option<&str>) -> Value {
        let filter = self.with_published(json!({
            "property": self.config.slug_property,
            "rich_text": {"is_empty": true},
        }));
        let mut body = json!({"filter": filter, "page_size": PAGE_SIZE});
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }

    /// Find a page without a slug property whose title slugifies to `slug`
    async fn find_by_title_slug(&self, slug: &str) -> Result<Option<NotionPage>, SourceError> {
        let mut cursor: Option<String> = None;

        loop {
            let response = self
                .query_database(&self.blank_slug_query(cursor.as_deref()))
                .await?;
            let found = response
                .results
                .into_iter()
                .find(|page| page_metadata(page, &self.config).0 == slug);
            if found.is_some() {
                return Ok(found);
            }

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => return Ok(None),
            }
        }
    }

    fn list_query(&self, cursor: Option<&str>) -> Value {
        let mut body = json!({
            "sorts": [{"property": self.config.date_property, "direction": "descending"}],
            "page_size": PAGE_SIZE,
        });
        if let Some(filter) = self.published_filter() {
            body["filter"] = filter;
        }
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }
}

impl ContentSource for NotionClient {
    async fn fetch_post(&self, slug: &str) -> Result<Option<BlogPost>, SourceError> {
        let response = self.query_database(&self.slug_query(slug)).await?;
        let page = match response.results.into_iter().next() {
            Some(page) => page,
            None => match self.find_by_title_slug(slug).await? {
                Some(page) => page,
                None => {
                    tracing::debug!(slug, "No Notion page for slug");
                    return Ok(None);
                }
            },
        };

        let (_, metadata) = page_metadata(&page, &self.config);
        let tree = self.block_tree(&page.id).await?;
        let markdown = blocks_to_markdown(&tree);
        tracing::debug!(slug, blocks = tree.len(), "Fetched Notion page");

        Ok(Some(BlogPost::new(
            slug,
            metadata,
            RawContent::from(json!({ "parent": markdown })),
        )))
    }

    async fn list_posts(&self) -> Result<Vec<PostSummary>, SourceError> {
        let mut posts = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let response = self.query_database(&self.list_query(cursor.as_deref())).await?;
            posts.extend(response.results.iter().map(|page| {
                let (slug, metadata) = page_metadata(page, &self.config);
                PostSummary { slug, metadata }
            }));

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(posts)
    }
}

/// Extract the slug and metadata from a database row
pub fn page_metadata(page: &NotionPage, config: &NotionConfig) -> (String, PostMetadata) {
    let props = &page.properties;

    let title = props
        .get(&config.title_property)
        .or_else(|| props.values().find(|p| p["type"] == "title"))
        .map(|p| plain_text(&p["title"]))
        .unwrap_or_default();

    let date = props
        .get(&config.date_property)
        .and_then(|p| p["date"]["start"].as_str())
        .map(str::to_string)
        .or_else(|| page.created_time.as_deref().map(display_date))
        .unwrap_or_default();

    let tags = props
        .get(&config.tags_property)
        .and_then(|p| p["multi_select"].as_array())
        .map(|options| {
            options
                .iter()
                .filter_map(|o| o["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let description = props
        .get(&config.description_property)
        .map(|p| plain_text(&p["rich_text"]))
        .unwrap_or_default();

    let slug = props
        .get(&config.slug_property)
        .map(|p| plain_text(&p["rich_text"]))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| slug::slugify(&title));

    (
        slug,
        PostMetadata {
            title,
            date,
            tags,
            description,
        },
    )
}

/// `2024-01-15T10:00:00.000Z` -> `2024-01-15`
fn display_date(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Concatenated `plain_text` of a rich text array
fn plain_text(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["plain_text"].as_str())
                .collect()
        })
        .unwrap_or_default()
}

/// Rich text array as inline Markdown
pub fn rich_text_to_markdown(rich_text: &Value) -> String {
    let Some(items) = rich_text.as_array() else {
        return String::new();
    };

    let mut out = String::new();
    for item in items {
        let text = item["plain_text"].as_str().unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        if item["type"] == "equation" {
            out.push_str(&format!("${}$", text));
            continue;
        }

        let annotations = &item["annotations"];
        let flag = |name: &str| annotations[name].as_bool().unwrap_or(false);

        let at_line_start = out.is_empty() || out.ends_with('\n');
        let mut piece = if flag("code") {
            inline_code(text)
        } else {
            escape_markdown(text, at_line_start)
        };
        if flag("strikethrough") {
            piece = format!("~~{}~~", piece);
        }
        if flag("italic") {
            piece = format!("_{}_", piece);
        }
        if flag("bold") {
            piece = format!("**{}**", piece);
        }
        if let Some(href) = item["href"].as_str() {
            piece = format!("[{}]({})", piece, link_destination(href));
        }
        out.push_str(&piece);
    }
    out
}

/// Backslash-escape text so Markdown renders it literally
fn escape_markdown(text: &str, at_line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let line_start = i > 0 || at_line_start;
        let indent = line.len() - line.trim_start_matches(' ').len();
        let (lead, rest) = line.split_at(indent);
        out.push_str(lead);

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        for (j, c) in rest.char_indices() {
            let block_marker = line_start
                && ((j == 0 && matches!(c, '-' | '+' | '='))
                    || (j == digits && digits > 0 && matches!(c, '.' | ')')));
            if block_marker
                || matches!(
                    c,
                    '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|' | '~' | '&'
                )
            {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

/// Longest run of consecutive backticks
fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}

/// Inline code span that survives backticks in its content
fn inline_code(text: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(text) + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{} {} {}", fence, text, fence)
    } else {
        format!("{}{}{}", fence, text, fence)
    }
}

/// Fenced code block whose fence outlasts any backtick run in the code
fn code_block(language: &str, code: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(code).max(2) + 1);
    format!("{}{}\n{}\n{}", fence, language, code, fence)
}

fn link_destination(href: &str) -> String {
    href.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}

/// Convert a block tree to Markdown
pub fn blocks_to_markdown(nodes: &[BlockNode]) -> String {
    let mut out = String::new();
    let mut prev_kind: Option<&str> = None;
    let mut number = 0;

    for node in nodes {
        let kind = node.block.kind.as_str();
        number = if kind == "numbered_list_item" {
            if prev_kind == Some("numbered_list_item") {
                number + 1
            } else {
                1
            }
        } else {
            0
        };

        let Some(markdown) = block_to_markdown(node, number) else {
            tracing::debug!(kind, id = %node.block.id, "Skipping unsupported Notion block");
            continue;
        };

        if let Some(prev) = prev_kind {
            if is_list_item(prev) && is_list_item(kind) {
                out.push('\n');
            } else {
                out.push_str("\n\n");
            }
        }
        out.push_str(&markdown);
        prev_kind = Some(kind);
    }

    out
}

fn is_list_item(kind: &str) -> bool {
    matches!(kind, "bulleted_list_item" | "numbered_list_item" | "to_do")
}

fn block_to_markdown(node: &BlockNode, number: usize) -> Option<String> {
    let block = &node.block;
    let payload = block.payload();
    let text = || rich_text_to_markdown(&payload["rich_text"]);
    let children = || blocks_to_markdown(&node.children);

    let markdown = match block.kind.as_str() {
        "paragraph" => with_children(text(), &children()),
        "heading_1" => with_children(format!("# {}", text()), &children()),
        "heading_2" => with_children(format!("## {}", text()), &children()),
        "heading_3" => with_children(format!("### {}", text()), &children()),
        "bulleted_list_item" => list_item("- ", &text(), &children()),
        "numbered_list_item" => list_item(&format!("{}. ", number), &text(), &children()),
        "to_do" => {
            let marker = if payload["checked"].as_bool().unwrap_or(false) {
                "- [x] "
            } else {
                "- [ ] "
            };
            list_item(marker, &text(), &children())
        }
        "quote" | "callout" => quote(&with_children(text(), &children())),
        "toggle" => with_children(text(), &children()),
        "code" => {
            let language = code_language(payload["language"].as_str().unwrap_or_default());
            code_block(&language, &plain_text(&payload["rich_text"]))
        }
        "divider" => "---".to_string(),
        "equation" => format!(
            "$$\n{}\n$$",
            payload["expression"].as_str().unwrap_or_default()
        ),
        "image" => {
            let url = payload["file"]["url"]
                .as_str()
                .or_else(|| payload["external"]["url"].as_str())?;
            format!(
                "![{}]({})",
                escape_markdown(&plain_text(&payload["caption"]), false),
                link_destination(url)
            )
        }
        "bookmark" | "embed" | "link_preview" | "video" | "pdf" | "file" => {
            let url = payload["url"]
                .as_str()
                .or_else(|| payload["file"]["url"].as_str())
                .or_else(|| payload["external"]["url"].as_str())?;
            let caption = plain_text(&payload["caption"]);
            let label = if caption.is_empty() { url } else { caption.as_str() };
            format!(
                "[{}]({})",
                escape_markdown(label, false),
                link_destination(url)
            )
        }
        "table" => table(node)?,
        "column_list" | "column" | "synced_block" => children(),
        _ => return None,
    };

    Some(markdown)
}

/// Notion language names to fence info strings
fn code_language(language: &str) -> String {
    match language {
        "" | "plain text" => "text".to_string(),
        other => other.replace(' ', "-"),
    }
}

fn with_children(text: String, children: &str) -> String {
    if children.is_empty() {
        text
    } else if text.is_empty() {
        children.to_string()
    } else {
        format!("{}\n\n{}", text, children)
    }
}

/// A list item with children indented to the item's content column
fn list_item(marker: &str, text: &str, children: &str) -> String {
    let mut out = format!("{}{}", marker, text);
    if !children.is_empty() {
        // Task markers only add the checkbox; content aligns after "- "
        let width = if marker.starts_with("- [") { 2 } else { marker.len() };
        let indent = " ".repeat(width);
        out.push('\n');
        out.push_str(&prefix_lines(children, &indent));
    }
    out
}

fn quote(text: &str) -> String {
    text.lines()
        .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {}", line) })
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape pipes not already escaped; inline code needs this inside tables
fn escape_table_pipes(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut chars = cell.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '|' => out.push_str("\\|"),
            c => out.push(c),
        }
    }
    out
}

/// GFM table from `table_row` children. The first row is the header.
fn table(node: &BlockNode) -> Option<String> {
    let rows: Vec<Vec<String>> = node
        .children
        .iter()
        .filter(|child| child.block.kind == "table_row")
        .map(|child| {
            child.block.payload()["cells"]
                .as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|cell| escape_table_pipes(&rich_text_to_markdown(cell)))
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let columns = rows.iter().map(Vec::len).max().filter(|&n| n > 0)?;
    let line = |row: &[String]| {
        let cells: Vec<&str> = (0..columns)
            .map(|i| row.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = vec![line(&rows[0]), format!("|{}", " --- |".repeat(columns))];
    lines.extend(rows[1..].iter().map(|row| line(row)));
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    fn text(content: &str) -> Value {
        json!([{
            "type": "text",
            "plain_text": content,
            "annotations": {"bold": false, "italic": false, "strikethrough": false, "code": false},
            "href": null
        }])
    }

    fn block(kind: &str, payload: Value) -> NotionBlock {
        serde_json::from_value(json!({
            "object": "block",
            "id": format!("{}-id", kind),
            "type": kind,
            "has_children": false,
            kind: payload,
        }))
        .unwrap()
    }

    fn leaf(kind: &str, payload: Value) -> BlockNode {
        BlockNode {
            block: block(kind, payload),
            children: vec![],
        }
    }

    fn sample_page() -> NotionPage {
        serde_json::from_value(json!({
            "object": "page",
            "id": "page-1",
            "created_time": "2024-01-10T08:00:00.000Z",
            "properties": {
                "Title": {"type": "title", "title": [{"plain_text": "Hello "}, {"plain_text": "World"}]},
                "Date": {"type": "date", "date": {"start": "2024-01-15"}},
                "Tags": {"type": "multi_select", "multi_select": [{"name": "rust"}, {"name": "web"}]},
                "Description": {"type": "rich_text", "rich_text": [{"plain_text": "A first post"}]},
                "Slug": {"type": "rich_text", "rich_text": [{"plain_text": "hello-world"}]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_page_metadata() {
        let (slug, meta) = page_metadata(&sample_page(), &NotionConfig::default());
        assert_eq!(slug, "hello-world");
        assert_eq!(meta.title, "Hello World");
        assert_eq!(meta.date, "2024-01-15");
        assert_eq!(meta.tags, vec!["rust", "web"]);
        assert_eq!(meta.description, "A first post");
    }

    #[test]
    fn test_page_metadata_fallbacks() {
        let page: NotionPage = serde_json::from_value(json!({
            "id": "page-2",
            "created_time": "2024-03-02T23:15:00.000Z",
            "properties": {
                "Name": {"type": "title", "title": [{"plain_text": "Some Title Here"}]}
            }
        }))
        .unwrap();
        let (slug, meta) = page_metadata(&page, &NotionConfig::default());
        assert_eq!(meta.title, "Some Title Here");
        assert_eq!(meta.date, "2024-03-02");
        assert!(meta.tags.is_empty());
        assert_eq!(meta.description, "");
        assert_eq!(slug, "some-title-here");
    }

    #[test]
    fn test_rich_text_annotations() {
        let rich = json!([
            {"type": "text", "plain_text": "plain "},
            {"type": "text", "plain_text": "bold", "annotations": {"bold": true}},
            {"type": "text", "plain_text": " and "},
            {"type": "text", "plain_text": "code", "annotations": {"code": true}},
            {"type": "text", "plain_text": " "},
            {"type": "text", "plain_text": "link", "href": "https://example.com"},
            {"type": "equation", "plain_text": "x^2"}
        ]);
        assert_eq!(
            rich_text_to_markdown(&rich),
            "plain **bold** and `code` [link](https://example.com)$x^2$"
        );
    }

    #[test]
    fn test_blocks_to_markdown() {
        let nodes = vec![
            leaf("heading_2", json!({"rich_text": text("Intro")})),
            leaf("paragraph", json!({"rich_text": text("Some text.")})),
            leaf("bulleted_list_item", json!({"rich_text": text("one")})),
            leaf("bulleted_list_item", json!({"rich_text": text("two")})),
            leaf("numbered_list_item", json!({"rich_text": text("first")})),
            leaf("numbered_list_item", json!({"rich_text": text("second")})),
            leaf("to_do", json!({"rich_text": text("done"), "checked": true})),
            leaf("quote", json!({"rich_text": text("wise words")})),
            leaf(
                "code",
                json!({"rich_text": text("print(1)"), "language": "python"}),
            ),
            leaf("divider", json!({})),
            leaf("unsupported", json!({})),
            leaf("code", json!({"rich_text": text("x"), "language": "plain text"})),
        ];

        assert_eq!(
            blocks_to_markdown(&nodes),
            "## Intro\n\n\
             Some text.\n\n\
             - one\n\
             - two\n\
             1. first\n\
             2. second\n\
             - [x] done\n\n\
             > wise words\n\n\
             ```python\nprint(1)\n```\n\n\
             ---\n\n\
             ```text\nx\n```"
        );
    }

    #[test]
    fn test_nested_list_children_are_indented() {
        let nodes = vec![BlockNode {
            block: block("numbered_list_item", json!({"rich_text": text("parent")})),
            children: vec![
                leaf("bulleted_list_item", json!({"rich_text": text("child a")})),
                leaf("bulleted_list_item", json!({"rich_text": text("child b")})),
            ],
        }];
        assert_eq!(
            blocks_to_markdown(&nodes),
            "1. parent\n   - child a\n   - child b"
        );
    }

    #[test]
    fn test_table() {
        let row = |a: &str, b: &str| leaf("table_row", json!({"cells": [text(a), text(b)]}));
        let nodes = vec![BlockNode {
            block: block("table", json!({"table_width": 2, "has_column_header": true})),
            children: vec![row("Name", "Value"), row("a|b", "1")],
        }];
        assert_eq!(
            blocks_to_markdown(&nodes),
            "| Name | Value |\n| --- | --- |\n| a\\|b | 1 |"
        );
    }

    #[test]
    fn test_notion_text_is_markdown_escaped() {
        let nodes = vec![
            leaf(
                "paragraph",
                json!({"rich_text": text("# not a heading, 2 * 3 * 4 <b>x</b>")}),
            ),
            leaf("paragraph", json!({"rich_text": text("1. not a list")})),
            leaf("paragraph", json!({"rich_text": text("- nor this")})),
        ];
        assert_eq!(
            blocks_to_markdown(&nodes),
            "\\# not a heading, 2 \\* 3 \\* 4 \\<b\\>x\\</b\\>\n\n\
             1\\. not a list\n\n\
             \\- nor this"
        );
    }

    #[test]
    fn test_inline_code_with_backtick() {
        let rich = json!([
            {"type": "text", "plain_text": "a`b", "annotations": {"code": true}},
            {"type": "text", "plain_text": " and "},
            {"type": "text", "plain_text": "`tick`", "annotations": {"code": true}}
        ]);
        assert_eq!(rich_text_to_markdown(&rich), "``a`b`` and `` `tick` ``");
    }

    #[test]
    fn test_code_fence_outlasts_content() {
        let nodes = vec![leaf(
            "code",
            json!({"rich_text": text("```\ninner\n```"), "language": "markdown"}),
        )];
        assert_eq!(
            blocks_to_markdown(&nodes),
            "````markdown\n```\ninner\n```\n````"
        );
    }

    #[tokio::test]
    async fn test_escaped_text_renders_literally() {
        use crate::content::{Highlighter, MarkdownRenderer};
        use std::sync::Arc;
        use std::time::Duration;

        let nodes = vec![
            leaf(
                "paragraph",
                json!({"rich_text": text("# not a heading, 2 * 3 * 4 <b>x</b>")}),
            ),
            leaf(
                "code",
                json!({"rich_text": text("```\ninner\n```"), "language": "plain text"}),
            ),
        ];
        let highlighter = Highlighter::new("base16-ocean.dark", false).unwrap();
        let renderer = MarkdownRenderer::new(Arc::new(highlighter), Duration::from_secs(5));
        let doc = renderer.render(&blocks_to_markdown(&nodes)).await;

        assert!(doc.html.contains(
            r#"<p class="post-p"># not a heading, 2 * 3 * 4 &lt;b&gt;x&lt;/b&gt;</p>"#
        ));
        assert!(!doc.html.contains("<h1"));
        assert!(!doc.html.contains("<b>"));
        assert_eq!(doc.code_blocks, 1);
        assert!(doc.html.contains("inner"));
    }

    #[test]
    fn test_image_and_bookmark() {
        let nodes = vec![
            leaf(
                "image",
                json!({"type": "external", "external": {"url": "https://img/x.png"}, "caption": text("A cat")}),
            ),
            leaf("bookmark", json!({"url": "https://example.com", "caption": []})),
        ];
        assert_eq!(
            blocks_to_markdown(&nodes),
            "![A cat](https://img/x.png)\n\n[https://example.com](https://example.com)"
        );
    }

    #[test]
    fn test_queries() {
        let creds = NotionCredentials {
            token: "t".to_string(),
            database_id: "db".to_string(),
        };
        let mut config = NotionConfig::default();
        let client = NotionClient::new(config.clone(), creds.clone()).unwrap();
        assert_eq!(
            client.slug_query("hello"),
            json!({"filter": {"property": "Slug", "rich_text": {"equals": "hello"}}, "page_size": 1})
        );

        config.published_property = Some("Published".to_string());
        let client = NotionClient::new(config, creds).unwrap();
        let query = client.slug_query("hello");
        assert_eq!(query["filter"]["and"][1]["property"], "Published");
        let list = client.list_query(Some("cursor-1"));
        assert_eq!(list["start_cursor"], "cursor-1");
        assert_eq!(list["sorts"][0]["direction"], "descending");
        assert_eq!(list["filter"]["checkbox"]["equals"], true);
    }

    /// Serve a fake Notion API on a random local port
    async fn mock_notion() -> String {
        async fn query(Path(db): Path<String>, Json(body): Json<Value>) -> Json<Value> {
            assert_eq!(db, "db");
            let pages = [
                json!({
                    "object": "page",
                    "id": "page-1",
                    "properties": {
                        "Title": {"type": "title", "title": [{"plain_text": "Hello World"}]},
                        "Date": {"type": "date", "date": {"start": "2024-01-15"}},
                        "Slug": {"type": "rich_text", "rich_text": [{"plain_text": "hello-world"}]}
                    }
                }),
                json!({
                    "object": "page",
                    "id": "page-2",
                    "properties": {
                        "Title": {"type": "title", "title": [{"plain_text": "Some Title"}]},
                        "Date": {"type": "date", "date": {"start": "2024-02-01"}},
                        "Slug": {"type": "rich_text", "rich_text": []}
                    }
                }),
            ];
            let slug_of = |page: &Value| {
                page["properties"]["Slug"]["rich_text"][0]["plain_text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            };
            let filter = &body["filter"]["rich_text"];
            let results: Vec<Value> = pages
                .into_iter()
                .filter(|page| {
                    if let Some(wanted) = filter["equals"].as_str() {
                        slug_of(page) == wanted
                    } else if filter["is_empty"] == true {
                        slug_of(page).is_empty()
                    } else {
                        true
                    }
                })
                .collect();
            Json(json!({"object": "list", "results": results, "has_more": false, "next_cursor": null}))
        }

        async fn children(
            Path(id): Path<String>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            let para = |s: &str| {
                json!({"id": s, "type": "paragraph", "has_children": false,
                       "paragraph": {"rich_text": [{"plain_text": s}]}})
            };
            match (id.as_str(), params.get("start_cursor").map(String::as_str)) {
                ("page-1", None) => Json(json!({
                    "results": [para("first"), {
                        "id": "list-1", "type": "bulleted_list_item", "has_children": true,
                        "bulleted_list_item": {"rich_text": [{"plain_text": "item"}]}
                    }],
                    "has_more": true,
                    "next_cursor": "c2"
                })),
                ("page-1", Some("c2")) => Json(json!({
                    "results": [para("last")], "has_more": false, "next_cursor": null
                })),
                ("list-1", None) => Json(json!({
                    "results": [{"id": "sub", "type": "bulleted_list_item", "has_children": false,
                                 "bulleted_list_item": {"rich_text": [{"plain_text": "sub"}]}}],
                    "has_more": false
                })),
                _ => Json(json!({"results": [], "has_more": false})),
            }
        }

        let app = Router::new()
            .route("/databases/:db/query", post(query))
            .route("/blocks/:id/children", get(children));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn mock_client(api_base: String) -> NotionClient {
        let config = NotionConfig {
            api_base,
            ..NotionConfig::default()
        };
        let creds = NotionCredentials {
            token: "secret".to_string(),
            database_id: "db".to_string(),
        };
        NotionClient::new(config, creds).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_post_from_api() {
        let client = mock_client(mock_notion().await);
        let post = client.fetch_post("hello-world").await.unwrap().unwrap();
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.metadata.title, "Hello World");
        assert!(matches!(post.markdown, RawContent::ObjectWithParent(_)));
        assert_eq!(post.markdown_body(), "first\n\n- item\n  - sub\n\nlast");
    }

    #[tokio::test]
    async fn test_fetch_missing_post_is_none() {
        let client = mock_client(mock_notion().await);
        assert!(client.fetch_post("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_posts_from_api() {
        let client = mock_client(mock_notion().await);
        let posts = client.list_posts().await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].slug, "hello-world");
        assert_eq!(posts[1].slug, "some-title");
    }

    #[tokio::test]
    async fn test_fetch_post_by_title_slug() {
        let client = mock_client(mock_notion().await);
        let post = client.fetch_post("some-title").await.unwrap().unwrap();
        assert_eq!(post.slug, "some-title");
        assert_eq!(post.metadata.title, "Some Title");
        assert_eq!(post.metadata.date, "2024-02-01");
    }

    #[tokio::test]
    async fn test_http_error_is_a_fault() {
        let app = Router::new().route(
            "/databases/:db/query",
            post(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    r#"{"code":"unauthorized"}"#,
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = mock_client(format!("http://{}", addr));
        let err = client.fetch_post("hello-world").await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_source_is_a_fault() {
        let client = mock_client("http://127.0.0.1:1".to_string());
        let err = client.fetch_post("hello-world").await.unwrap_err();
        assert!(matches!(err, SourceError::Http(_)));
    }
}
