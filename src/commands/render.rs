//! Render a single post page

use anyhow::{bail, Result};
use std::path::Path;

use crate::content::ContentSource;
use crate::Blog;

/// Render the page for `slug` to a file, or to stdout when no output is given
pub async fn run<S: ContentSource>(blog: &Blog<S>, slug: &str, output: Option<&Path>) -> Result<()> {
    let Some(html) = blog.render_post_page(slug).await? else {
        bail!("No post found with slug `{}`", slug);
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, html)?;
            println!("Rendered {} to {:?}", slug, path);
        }
        None => println!("{}", html),
    }

    Ok(())
}
