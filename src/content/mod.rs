//! Content module - posts, content sources, and body rendering

mod highlight;
mod markdown;
pub mod notion;
mod post;
mod raw;
pub mod source;

pub use highlight::{HighlightError, Highlighter};
pub use markdown::{MarkdownRenderer, RenderedDocument};
pub use notion::NotionClient;
pub use post::{BlogPost, PageMetadata, PostMetadata, PostSummary};
pub use raw::{normalize, RawContent};
pub use source::{ContentSource, MemorySource, SourceError};
