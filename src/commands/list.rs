//! List posts

use anyhow::Result;

use crate::content::{ContentSource, PostSummary};
use crate::helpers::post_url;
use crate::Blog;

/// Print every post, newest first
pub async fn run<S: ContentSource>(blog: &Blog<S>) -> Result<()> {
    let posts = blog.source().list_posts().await?;
    println!("Posts ({}):", posts.len());
    for post in &posts {
        println!("{}", format_line(blog, post));
    }
    Ok(())
}

fn format_line<S: ContentSource>(blog: &Blog<S>, post: &PostSummary) -> String {
    let mut line = format!(
        "  {} - {} [{}]",
        post.metadata.date,
        post.metadata.title,
        post_url(&blog.config, &post.slug)
    );
    if !post.metadata.tags.is_empty() {
        line.push_str(&format!(" #{}", post.metadata.tags.join(" #")));
    }
    line
}
