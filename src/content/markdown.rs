//! Markdown rendering with syntax highlighting
//!
//! Rendering runs in three passes: the event stream is collected with every
//! code block replaced by an indexed placeholder, all code blocks are
//! highlighted concurrently, then the placeholders are swapped for the
//! results and the stream is serialized to HTML.

use futures::future::join_all;
use lazy_static::lazy_static;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

use super::highlight::{plain_code_block, Highlighter, DEFAULT_LANGUAGE};
use crate::helpers::html_escape;

lazy_static! {
    static ref LANGUAGE_TAG: Regex = Regex::new(r"^[\w+#.-]+").unwrap();
}

const H2_CLASS: &str = "post-h2";
const H3_CLASS: &str = "post-h3";
const PARAGRAPH_CLASS: &str = "post-p";
const UL_CLASS: &str = "post-ul";
const OL_CLASS: &str = "post-ol";
const BLOCKQUOTE_CLASS: &str = "post-blockquote";

/// HTML produced for one post body
#[derive(Debug, Clone, Default)]
pub struct RenderedDocument {
    pub html: String,
    /// Number of code blocks in the document
    pub code_blocks: usize,
    /// Code blocks that fell back to unhighlighted output
    pub degraded_blocks: usize,
}

/// A code block waiting for highlighting
#[derive(Debug, Clone, PartialEq)]
struct CodeJob {
    lang: String,
    code: String,
}

/// Output for one code block
struct HighlightedBlock {
    html: String,
    degraded: bool,
}

enum Node<'a> {
    Event(Event<'a>),
    /// Index into the code job list
    Code(usize),
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    highlighter: Arc<Highlighter>,
    timeout: Duration,
}

impl MarkdownRenderer {
    /// Create a renderer. `timeout` bounds highlighting of each code block.
    pub fn new(highlighter: Arc<Highlighter>, timeout: Duration) -> Self {
        Self {
            highlighter,
            timeout,
        }
    }

    /// Render markdown to HTML.
    ///
    /// Never fails: code blocks that cannot be highlighted are emitted as
    /// plain escaped code.
    pub async fn render(&self, markdown: &str) -> RenderedDocument {
        let (nodes, jobs) = collect_nodes(markdown);
        let code_blocks = jobs.len();

        let mut blocks: Vec<Option<HighlightedBlock>> = self
            .highlight_all(jobs)
            .await
            .into_iter()
            .map(Some)
            .collect();
        let degraded_blocks = blocks.iter().flatten().filter(|b| b.degraded).count();

        let events = nodes.into_iter().map(|node| match node {
            Node::Event(event) => event,
            Node::Code(index) => {
                let html = blocks[index].take().map(|b| b.html).unwrap_or_default();
                Event::Html(CowStr::from(html))
            }
        });

        let mut html_output = String::with_capacity(markdown.len() * 2);
        html::push_html(&mut html_output, events);

        tracing::debug!(code_blocks, degraded_blocks, "Rendered markdown");

        RenderedDocument {
            html: html_output,
            code_blocks,
            degraded_blocks,
        }
    }

    /// Highlight every job concurrently; output order follows job order
    async fn highlight_all(&self, jobs: Vec<CodeJob>) -> Vec<HighlightedBlock> {
        let tasks = jobs.into_iter().enumerate().map(|(index, job)| {
            let highlighter = Arc::clone(&self.highlighter);
            let timeout = self.timeout;

            async move {
                let CodeJob { lang, code } = job;
                let (task_lang, task_code) = (lang.clone(), code.clone());
                let task = tokio::task::spawn_blocking(move || {
                    highlighter.highlight(&task_code, &task_lang)
                });

                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(Ok(html))) => HighlightedBlock {
                        html,
                        degraded: false,
                    },
                    Ok(Ok(Err(e))) => {
                        tracing::warn!(index, %lang, "Highlighting failed: {}", e);
                        fallback(&code, &lang)
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(index, %lang, "Highlight task failed: {}", e);
                        fallback(&code, &lang)
                    }
                    Err(_) => {
                        tracing::warn!(index, %lang, ?timeout, "Highlighting timed out");
                        fallback(&code, &lang)
                    }
                }
            }
        });

        join_all(tasks).await
    }
}

fn fallback(code: &str, lang: &str) -> HighlightedBlock {
    HighlightedBlock {
        html: plain_code_block(code, lang),
        degraded: true,
    }
}

/// Parse markdown into styled events, pulling code blocks out as jobs
fn collect_nodes(markdown: &str) -> (Vec<Node<'_>>, Vec<CodeJob>) {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES;
    let parser = Parser::new_ext(markdown, options);

    let mut nodes = Vec::new();
    let mut jobs = Vec::new();
    let mut code_block_lang: Option<String> = None;
    let mut code_block_content = String::new();

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                code_block_lang = Some(code_language(&kind));
                code_block_content.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                let lang = code_block_lang
                    .take()
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
                let code = code_block_content
                    .strip_suffix('\n')
                    .unwrap_or(&code_block_content)
                    .to_string();
                nodes.push(Node::Code(jobs.len()));
                jobs.push(CodeJob { lang, code });
            }
            Event::Text(text) if code_block_lang.is_some() => {
                code_block_content.push_str(&text);
            }
            // Raw HTML in a post body is shown as text, never passed through
            Event::Html(raw) | Event::InlineHtml(raw) => nodes.push(Node::Event(Event::Text(raw))),
            event => nodes.push(Node::Event(style_event(event))),
        }
    }

    (nodes, jobs)
}

/// Language declared by a code block, or the default
fn code_language(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => LANGUAGE_TAG
            .find(info.trim())
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        CodeBlockKind::Indented => DEFAULT_LANGUAGE.to_string(),
    }
}

/// Give post-body block elements their styling classes.
///
/// Only opening tags change; closing tags are written by `push_html`.
fn style_event(event: Event<'_>) -> Event<'_> {
    let opening = match &event {
        Event::Start(Tag::Heading {
            level: level @ (HeadingLevel::H2 | HeadingLevel::H3),
            id,
            classes,
            attrs,
        }) => {
            let base = if *level == HeadingLevel::H2 {
                H2_CLASS
            } else {
                H3_CLASS
            };
            let mut class = base.to_string();
            for extra in classes {
                class.push(' ');
                class.push_str(extra);
            }
            let id_attr = id
                .as_ref()
                .map(|id| format!(r#" id="{}""#, html_escape(id)))
                .unwrap_or_default();
            let mut extra_attrs = String::new();
            for (key, value) in attrs {
                extra_attrs.push(' ');
                extra_attrs.push_str(&html_escape(key));
                if let Some(value) = value {
                    extra_attrs.push_str(&format!(r#"="{}""#, html_escape(value)));
                }
            }
            format!(
                r#"<{}{} class="{}"{}>"#,
                level,
                id_attr,
                html_escape(&class),
                extra_attrs
            )
        }
        Event::Start(Tag::Paragraph) => format!(r#"<p class="{}">"#, PARAGRAPH_CLASS),
        Event::Start(Tag::List(None)) => format!("<ul class=\"{}\">\n", UL_CLASS),
        Event::Start(Tag::List(Some(1))) => format!("<ol class=\"{}\">\n", OL_CLASS),
        Event::Start(Tag::List(Some(start))) => {
            format!("<ol class=\"{}\" start=\"{}\">\n", OL_CLASS, start)
        }
        Event::Start(Tag::BlockQuote(None)) => {
            format!("<blockquote class=\"{}\">\n", BLOCKQUOTE_CLASS)
        }
        _ => return event,
    };

    Event::Html(CowStr::from(opening))
}
