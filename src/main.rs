//! CLI entry point for notion-blog-rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notion_blog_rs::config::SiteConfig;
use notion_blog_rs::content::ContentSource;
use notion_blog_rs::{commands, server, Blog};

#[derive(Parser)]
#[command(name = "notion-blog")]
#[command(author = "Benjy Ross")]
#[command(version)]
#[command(about = "A server-rendered blog that reads posts from a Notion database", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Read posts from a JSON file instead of Notion
    #[arg(long, global = true)]
    posts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the blog server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to
        #[arg(short, long)]
        ip: Option<String>,
    },

    /// Render one post page to a file or stdout
    Render {
        /// Slug of the post
        slug: String,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List posts
    List,

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "notion_blog_rs=debug,info"
    } else {
        "notion_blog_rs=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Commands::Version = cli.command {
        println!("notion-blog version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = SiteConfig::load_or_default(&base_dir)?;

    match cli.posts {
        Some(path) => {
            let source = commands::load_posts_file(&path)?;
            run(Blog::new(config, source)?, cli.command).await
        }
        None => {
            // Missing credentials stop here, before anything binds
            let source = commands::notion_source(&config)?;
            run(Blog::new(config, source)?, cli.command).await
        }
    }
}

async fn run<S: ContentSource>(blog: Blog<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Serve { port, ip } => {
            let ip = ip.unwrap_or_else(|| blog.config.server.ip.clone());
            let port = port.unwrap_or(blog.config.server.port);
            tracing::info!("Starting server at http://{}:{}", ip, port);
            server::start(blog, &ip, port).await?;
        }

        Commands::Render { slug, output } => {
            commands::render::run(&blog, &slug, output.as_deref()).await?;
        }

        Commands::List => {
            commands::list::run(&blog).await?;
        }

        Commands::Version => {}
    }

    Ok(())
}
