//! Syntax highlighting for fenced code blocks

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use thiserror::Error;

use crate::helpers::html_escape;

/// Language used when a code block declares none
pub const DEFAULT_LANGUAGE: &str = "text";

const PLAIN_TEXT_ALIASES: &[&str] = &["text", "plain", "plaintext", "txt"];

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("unknown highlight theme `{0}`")]
    UnknownTheme(String),

    #[error("no syntax definition for language `{0}`")]
    UnknownLanguage(String),

    #[error(transparent)]
    Syntect(#[from] syntect::Error),
}

/// Syntect highlighter bound to a single color theme.
///
/// Read-only after construction, so one instance is shared across requests
/// and across concurrently highlighted blocks.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
    line_numbers: bool,
}

impl Highlighter {
    /// Create a highlighter using one of syntect's bundled themes
    pub fn new(theme_name: &str, line_numbers: bool) -> Result<Self, HighlightError> {
        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .remove(theme_name)
            .ok_or_else(|| HighlightError::UnknownTheme(theme_name.to_string()))?;

        Ok(Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
            line_numbers,
        })
    }

    fn find_syntax(&self, lang: &str) -> Option<&SyntaxReference> {
        if PLAIN_TEXT_ALIASES.contains(&lang.to_ascii_lowercase().as_str()) {
            return Some(self.syntax_set.find_syntax_plain_text());
        }

        self.syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .or_else(|| {
                self.syntax_set
                    .find_syntax_by_extension(&lang.to_ascii_lowercase())
            })
    }

    /// Highlight a code block. Fails for languages without a syntax definition.
    pub fn highlight(&self, code: &str, lang: &str) -> Result<String, HighlightError> {
        let syntax = self
            .find_syntax(lang)
            .ok_or_else(|| HighlightError::UnknownLanguage(lang.to_string()))?;

        let highlighted = highlighted_html_for_string(code, &self.syntax_set, syntax, &self.theme)?;

        let body = if self.line_numbers {
            add_line_numbers(&highlighted, code)
        } else {
            highlighted
        };

        Ok(format!(
            r#"<div class="code-block" data-lang="{}">{}</div>"#,
            html_escape(lang),
            body
        ))
    }
}

/// Unhighlighted rendering used when highlighting a block fails
pub fn plain_code_block(code: &str, lang: &str) -> String {
    format!(
        r#"<pre><code class="language-{}">{}</code></pre>"#,
        html_escape(lang),
        html_escape(code)
    )
}

/// Put a line-number gutter next to highlighted code
fn add_line_numbers(highlighted: &str, code: &str) -> String {
    let line_count = code.lines().count().max(1);
    let gutter = (1..=line_count)
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<table class="highlight"><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table>"#,
        gutter, highlighted
    )
}
